//! Per-run state, convergence policy and the final result.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agents::{ConfidenceReport, Plan};
use crate::llm::SentinelKind;
use crate::storage::SessionId;

use super::config::{DEFAULT_CONFIDENCE_TARGET, DEFAULT_RISK_CEILING};

/// Joint confidence/hallucination stop condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceCriterion {
    /// Confidence must be at least this.
    pub confidence_target: u8,
    /// Hallucination risk must be strictly below this.
    pub risk_ceiling: u8,
}

impl Default for ConvergenceCriterion {
    fn default() -> Self {
        Self {
            confidence_target: DEFAULT_CONFIDENCE_TARGET,
            risk_ceiling: DEFAULT_RISK_CEILING,
        }
    }
}

impl ConvergenceCriterion {
    pub fn is_converged(&self, report: &ConfidenceReport) -> bool {
        report.confidence_score >= self.confidence_target
            && report.hallucination_risk_score < self.risk_ceiling
    }
}

/// Mutable state owned by exactly one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineState {
    pub goal: String,
    pub research_output: Option<String>,
    pub developer_output: Option<String>,
    pub writer_output: Option<String>,
    pub confidence: Option<ConfidenceReport>,
    pub iteration_count: u32,
}

impl PipelineState {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Self::default()
        }
    }

    /// Issues to re-verify in the next research pass.
    pub fn feedback_issues(&self) -> &[String] {
        self.confidence
            .as_ref()
            .map(|report| report.hallucination_issues.as_slice())
            .unwrap_or(&[])
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "sentinel", rename_all = "snake_case")]
pub enum Termination {
    /// The convergence criterion held.
    Converged,
    /// The iteration cap was reached without convergence.
    Exhausted,
    /// The writing call returned a sentinel outcome.
    Degraded(SentinelKind),
}

impl Termination {
    pub fn label(&self) -> &'static str {
        match self {
            Termination::Converged => "converged",
            Termination::Exhausted => "exhausted",
            Termination::Degraded(_) => "degraded",
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Termination::Degraded(_))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Degraded(kind) => write!(f, "degraded ({})", kind),
            other => f.write_str(other.label()),
        }
    }
}

/// Delivery attempted after termination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub target: String,
    pub subject: String,
    pub ok: bool,
    pub detail: String,
}

/// Result of a run or resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResult {
    pub session_id: SessionId,
    pub goal: String,
    pub plan: Plan,
    pub iteration_count: u32,
    pub research_output: Option<String>,
    pub developer_output: Option<String>,
    pub document: Option<String>,
    pub confidence: ConfidenceReport,
    pub termination: Termination,
    pub notification: Option<NotificationRecord>,
}

impl FinalResult {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convergence_boundaries() {
        let criterion = ConvergenceCriterion::default();
        assert!(criterion.is_converged(&ConfidenceReport::new(90, 39)));
        assert!(!criterion.is_converged(&ConfidenceReport::new(89, 0)));
        assert!(!criterion.is_converged(&ConfidenceReport::new(100, 40)));
        assert!(!criterion.is_converged(&ConfidenceReport::fallback()));
    }

    #[test]
    fn test_feedback_issues_follow_latest_report() {
        let mut state = PipelineState::new("goal");
        assert!(state.feedback_issues().is_empty());
        state.confidence =
            Some(ConfidenceReport::new(40, 70).with_issues(["claim X unverified"]));
        assert_eq!(state.feedback_issues(), ["claim X unverified".to_string()]);
    }

    #[test]
    fn test_termination_serialization() {
        let json = serde_json::to_value(Termination::Degraded(SentinelKind::RateLimited))
            .expect("serialize");
        assert_eq!(json["kind"], "degraded");
        assert_eq!(json["sentinel"], "rate_limited");
        assert_eq!(Termination::Converged.to_string(), "converged");
    }
}
