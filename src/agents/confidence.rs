//! Confidence agent: scores a candidate document.
//!
//! The assessment call runs with `validation` purpose. Its output is decoded
//! leniently: a JSON report, a bare integer, or the first integer in the
//! text. Anything else (including sentinel outcomes) yields
//! [`ConfidenceReport::fallback`], which never converges.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::{GenerationRequest, SentinelKind, TextGenerator};
use crate::utils::json_extraction::decode_json_object;

pub const AGENT_NAME: &str = "Confidence";

/// Confidence assumed when the assessment cannot be read.
pub const FALLBACK_CONFIDENCE: u8 = 40;

/// Hallucination risk assumed when the assessment does not state one.
pub const DEFAULT_HALLUCINATION_RISK: u8 = 50;

/// Where a report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    /// Decoded from the assessment model's output.
    Llm,
    /// Substituted because the assessment was unusable.
    Fallback,
    /// Synthesised because the pipeline stopped before assessment.
    Interrupted,
}

/// Result of assessing one candidate document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub confidence_score: u8,
    pub hallucination_risk_score: u8,
    pub hallucination_issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hallucination_summary: Option<String>,
    pub source: ReportSource,
}

impl ConfidenceReport {
    /// A report decoded from model output.
    pub fn new(confidence_score: u8, hallucination_risk_score: u8) -> Self {
        Self {
            confidence_score: confidence_score.min(100),
            hallucination_risk_score: hallucination_risk_score.min(100),
            hallucination_issues: Vec::new(),
            hallucination_summary: None,
            source: ReportSource::Llm,
        }
    }

    pub fn with_issues<I, S>(mut self, issues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hallucination_issues = issues.into_iter().map(Into::into).collect();
        self
    }

    /// Conservative stand-in for an unusable assessment.
    pub fn fallback() -> Self {
        Self {
            source: ReportSource::Fallback,
            ..Self::new(FALLBACK_CONFIDENCE, DEFAULT_HALLUCINATION_RISK)
        }
    }

    /// Report for a run cut short by a sentinel outcome on the writing call.
    pub fn interrupted(kind: SentinelKind) -> Self {
        let (reason, summary) = match kind {
            SentinelKind::RateLimited => (
                "Pipeline interrupted due to rate limiting",
                "Unable to complete pipeline - generation backend rate limited",
            ),
            SentinelKind::Unavailable => (
                "Pipeline interrupted because no generation backend was available",
                "Unable to complete pipeline - generation backend unavailable",
            ),
        };
        Self {
            confidence_score: 0,
            hallucination_risk_score: 0,
            hallucination_issues: vec![reason.to_string()],
            hallucination_summary: Some(summary.to_string()),
            source: ReportSource::Interrupted,
        }
    }
}

static FIRST_INT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b(\d{1,3})\b").ok());

/// Rounds and clamps a score into 0..=100. Non-finite values are not scores.
fn clamp_score(value: f64) -> Option<u8> {
    value
        .is_finite()
        .then(|| value.round().clamp(0.0, 100.0) as u8)
}

fn score_from_value(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_f64().and_then(clamp_score),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(clamp_score),
        _ => None,
    }
}

fn issues_from_value(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Decodes assessment output. Returns `None` when no score can be found.
pub fn parse_assessment(raw: &str) -> Option<ConfidenceReport> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(bare) = text.parse::<f64>() {
        return clamp_score(bare)
            .map(|score| ConfidenceReport::new(score, DEFAULT_HALLUCINATION_RISK));
    }

    if let Some(object) = decode_json_object::<serde_json::Map<String, Value>>(text) {
        if let Some(confidence) = object.get("confidence_score").and_then(score_from_value) {
            let risk = object
                .get("hallucination_risk_score")
                .and_then(score_from_value)
                .unwrap_or(DEFAULT_HALLUCINATION_RISK);
            let mut report = ConfidenceReport::new(confidence, risk)
                .with_issues(issues_from_value(object.get("hallucination_issues")));
            report.hallucination_summary = object
                .get("hallucination_summary")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Some(report);
        }
    }

    let first = FIRST_INT.as_ref()?.captures(text)?.get(1)?;
    let score = first.as_str().parse::<f64>().ok().and_then(clamp_score)?;
    Some(ConfidenceReport::new(score, DEFAULT_HALLUCINATION_RISK))
}

/// Assessment prompt for a candidate document.
pub fn assessment_prompt(document: &str) -> String {
    format!(
        r#"Assess the document below for factual confidence and hallucination risk.

Return ONLY JSON:
{{"confidence_score": <int 0-100>, "hallucination_risk_score": <int 0-100>, "hallucination_issues": ["<specific unsupported claim>", ...]}}

- confidence_score: how confident you are that the document is correct and complete.
- hallucination_risk_score: how likely the document contains fabricated or unsupported claims.
- hallucination_issues: each claim that needs verification, quoted or paraphrased precisely.

Document:
----------------
{document}
----------------
"#
    )
}

/// Scores documents through a [`TextGenerator`].
pub struct ConfidenceAgent {
    generator: Arc<dyn TextGenerator>,
}

impl ConfidenceAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Assesses a document. Never fails; unusable output yields the fallback report.
    pub async fn assess(&self, document: &str) -> ConfidenceReport {
        let outcome = self
            .generator
            .generate(GenerationRequest::validation(
                assessment_prompt(document),
                AGENT_NAME,
            ))
            .await;

        let Some(raw) = outcome.text() else {
            tracing::warn!(
                outcome = outcome.label(),
                "Assessment produced no text, using fallback report"
            );
            return ConfidenceReport::fallback();
        };

        parse_assessment(raw).unwrap_or_else(|| {
            tracing::warn!("Assessment output had no score, using fallback report");
            ConfidenceReport::fallback()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationOutcome, Purpose};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedGenerator {
        outcome: GenerationOutcome,
        purposes: Mutex<Vec<Purpose>>,
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, request: GenerationRequest) -> GenerationOutcome {
            self.purposes
                .lock()
                .expect("lock poisoned")
                .push(request.purpose);
            self.outcome.clone()
        }
    }

    fn scripted_agent(outcome: GenerationOutcome) -> (ConfidenceAgent, Arc<ScriptedGenerator>) {
        let generator = Arc::new(ScriptedGenerator {
            outcome,
            purposes: Mutex::new(Vec::new()),
        });
        (ConfidenceAgent::new(generator.clone()), generator)
    }

    #[test]
    fn test_parse_bare_integer() {
        let report = parse_assessment(" 87 ").expect("report");
        assert_eq!(report.confidence_score, 87);
        assert_eq!(report.hallucination_risk_score, DEFAULT_HALLUCINATION_RISK);
        assert_eq!(report.source, ReportSource::Llm);
    }

    #[test]
    fn test_parse_full_json_report() {
        let raw = r#"```json
{"confidence_score": 95, "hallucination_risk_score": "20", "hallucination_issues": ["claim X unverified", ""]}
```"#;
        let report = parse_assessment(raw).expect("report");
        assert_eq!(report.confidence_score, 95);
        assert_eq!(report.hallucination_risk_score, 20);
        assert_eq!(report.hallucination_issues, vec!["claim X unverified"]);
    }

    #[test]
    fn test_parse_clamps_out_of_range_scores() {
        let report =
            parse_assessment(r#"{"confidence_score": 140, "hallucination_risk_score": -5}"#)
                .expect("report");
        assert_eq!(report.confidence_score, 100);
        assert_eq!(report.hallucination_risk_score, 0);
    }

    #[test]
    fn test_parse_first_integer_in_prose() {
        let report = parse_assessment("I would rate this 72 out of 100.").expect("report");
        assert_eq!(report.confidence_score, 72);
    }

    #[test]
    fn test_parse_rejects_scoreless_text() {
        assert!(parse_assessment("looks fine to me").is_none());
        assert!(parse_assessment("").is_none());
    }

    #[tokio::test]
    async fn test_assess_uses_validation_purpose() {
        let (agent, generator) = scripted_agent(GenerationOutcome::success("91"));
        let report = agent.assess("doc").await;
        assert_eq!(report.confidence_score, 91);
        assert_eq!(
            *generator.purposes.lock().expect("lock poisoned"),
            vec![Purpose::Validation]
        );
    }

    #[tokio::test]
    async fn test_assess_falls_back_on_sentinel_and_garbage() {
        let (agent, _) = scripted_agent(GenerationOutcome::RateLimited);
        assert_eq!(agent.assess("doc").await, ConfidenceReport::fallback());

        let (agent, _) = scripted_agent(GenerationOutcome::success("no idea"));
        let report = agent.assess("doc").await;
        assert_eq!(report.confidence_score, FALLBACK_CONFIDENCE);
        assert_eq!(report.source, ReportSource::Fallback);
    }

    #[test]
    fn test_parse_rejects_non_finite_scores() {
        assert!(parse_assessment("NaN").is_none());
        assert!(parse_assessment("infinity").is_none());
        // A non-finite risk alone falls back to the default risk.
        let report =
            parse_assessment(r#"{"confidence_score": 70, "hallucination_risk_score": "NaN"}"#)
                .expect("report");
        assert_eq!(report.hallucination_risk_score, DEFAULT_HALLUCINATION_RISK);
    }

    #[tokio::test]
    async fn test_assess_non_finite_payload_uses_fallback() {
        let (agent, _) = scripted_agent(GenerationOutcome::success(
            r#"{"confidence_score":"inf","hallucination_risk_score":"NaN"}"#,
        ));
        assert_eq!(agent.assess("doc").await, ConfidenceReport::fallback());

        let (agent, _) = scripted_agent(GenerationOutcome::success("NaN"));
        let report = agent.assess("doc").await;
        assert_eq!(report.confidence_score, FALLBACK_CONFIDENCE);
        assert_eq!(report.source, ReportSource::Fallback);
    }

    #[test]
    fn test_interrupted_report_names_the_sentinel() {
        let report = ConfidenceReport::interrupted(SentinelKind::RateLimited);
        assert_eq!(report.confidence_score, 0);
        assert_eq!(report.hallucination_risk_score, 0);
        assert_eq!(
            report.hallucination_issues,
            vec!["Pipeline interrupted due to rate limiting"]
        );
        assert!(report
            .hallucination_summary
            .as_deref()
            .is_some_and(|s| s.ends_with("rate limited")));

        let report = ConfidenceReport::interrupted(SentinelKind::Unavailable);
        assert!(report
            .hallucination_summary
            .as_deref()
            .is_some_and(|s| s.ends_with("unavailable")));
    }
}
