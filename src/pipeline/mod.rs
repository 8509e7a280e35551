//! Iterative refinement of a drafted document.
//!
//! # Pipeline Flow
//!
//! 1. **Plan**: the planner assigns one task to each of Research, Developer and Writer
//! 2. **Research**: gathers facts, re-verifying issues flagged by the previous assessment
//! 3. **Develop**: produces a technical outline from the research
//! 4. **Write**: drafts the candidate document from both prior outputs
//! 5. **Assess**: scores confidence and hallucination risk
//!
//! Steps 2-5 repeat until the [`ConvergenceCriterion`] holds or the iteration
//! cap is reached. A sentinel outcome on the writing call ends the run at once
//! with a degraded result.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use agentforge::llm::{Gateway, GatewayConfig};
//! use agentforge::pipeline::{PipelineConfig, RefinementPipeline};
//! use agentforge::storage::MemorySessionStore;
//!
//! let gateway = Arc::new(Gateway::from_config(GatewayConfig::from_env()?)?);
//! let pipeline = RefinementPipeline::new(
//!     gateway,
//!     Arc::new(MemorySessionStore::new()),
//!     PipelineConfig::from_env()?,
//! );
//!
//! let result = pipeline.run("Explain how tides work", None, None).await?;
//! println!("{} after {} iterations", result.termination, result.iteration_count);
//! ```

pub mod config;
pub mod orchestrator;
pub mod state;

pub use config::PipelineConfig;
pub use orchestrator::{PipelineError, RefinementPipeline, RESUME_WRITER_TASK};
pub use state::{
    ConvergenceCriterion, FinalResult, NotificationRecord, PipelineState, Termination,
};
