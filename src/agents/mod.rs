//! Role capabilities used by the refinement pipeline.
//!
//! - [`PlannerAgent`]: goal to [`Plan`], falling back to a default three-task plan
//! - [`ResearchAgent`], [`DeveloperAgent`], [`WriterAgent`]: one generation call each
//! - [`ConfidenceAgent`]: one validation call producing a [`ConfidenceReport`]
//!
//! Agents never return errors. Generation problems surface as sentinel
//! [`crate::llm::GenerationOutcome`]s and decode problems as fallback values.

pub mod confidence;
pub mod planner;
pub mod roles;

pub use confidence::{parse_assessment, ConfidenceAgent, ConfidenceReport, ReportSource};
pub use planner::{decode_plan, Plan, PlanTask, PlannerAgent, StageRole, DEFAULT_WRITER_TASK};
pub use roles::{
    developer_brief, research_brief, writer_brief, DeveloperAgent, ResearchAgent, StageAgent,
    WriterAgent, FEEDBACK_HEADER,
};
