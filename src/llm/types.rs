//! Shared vocabulary for generation calls.
//!
//! A [`GenerationRequest`] goes into the gateway and exactly one
//! [`GenerationOutcome`] comes back. Sentinel outcomes carry no text; the
//! literal sentinel tokens only exist so that free text produced by a backend
//! (or handed to an outer caller) can be recognised as a non-content result.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Literal token meaning "the backend rate-limited this call".
pub const RATE_LIMITED_TOKEN: &str = "__LLM_RATE_LIMITED__";

/// Literal token meaning "no backend could serve this call".
pub const UNAVAILABLE_TOKEN: &str = "__LLM_UNAVAILABLE__";

/// Functional role of a generation call.
///
/// Selects which credential of a pool and which backend handle the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// Content production (planning, research, development, writing).
    Generation,
    /// Quality assessment of produced content.
    Validation,
}

impl Purpose {
    /// Returns the lowercase name used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Generation => "generation",
            Purpose::Validation => "validation",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generation" => Ok(Purpose::Generation),
            "validation" => Ok(Purpose::Validation),
            other => Err(format!("unknown purpose '{}'", other)),
        }
    }
}

/// A message in a conversation with a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (e.g., "system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One generation call, created fresh per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The prompt text.
    pub prompt: String,
    /// Persona framing for the call (e.g. "Research").
    pub role: String,
    /// Which credential/backend class handles the call.
    pub purpose: Purpose,
}

impl GenerationRequest {
    /// Creates a new request.
    pub fn new(prompt: impl Into<String>, role: impl Into<String>, purpose: Purpose) -> Self {
        Self {
            prompt: prompt.into(),
            role: role.into(),
            purpose,
        }
    }

    /// Creates a request for content production.
    pub fn generation(prompt: impl Into<String>, role: impl Into<String>) -> Self {
        Self::new(prompt, role, Purpose::Generation)
    }

    /// Creates a request for quality assessment.
    pub fn validation(prompt: impl Into<String>, role: impl Into<String>) -> Self {
        Self::new(prompt, role, Purpose::Validation)
    }

    /// System framing sent alongside the prompt.
    pub fn system_prompt(&self) -> String {
        format!("You are the {} agent.", self.role)
    }

    /// Renders the request as a system + user conversation.
    pub fn messages(&self) -> Vec<Message> {
        vec![Message::system(self.system_prompt()), Message::user(&self.prompt)]
    }
}

/// The two non-content outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelKind {
    RateLimited,
    Unavailable,
}

impl SentinelKind {
    /// The literal token for this sentinel.
    pub fn token(self) -> &'static str {
        match self {
            SentinelKind::RateLimited => RATE_LIMITED_TOKEN,
            SentinelKind::Unavailable => UNAVAILABLE_TOKEN,
        }
    }

    /// Finds a sentinel token embedded anywhere in `text`.
    ///
    /// Rate limiting wins when both tokens are present.
    pub fn detect(text: &str) -> Option<Self> {
        [SentinelKind::RateLimited, SentinelKind::Unavailable]
            .into_iter()
            .find(|kind| text.contains(kind.token()))
    }
}

impl fmt::Display for SentinelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentinelKind::RateLimited => write!(f, "rate_limited"),
            SentinelKind::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Tagged result of one gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Success { text: String },
    RateLimited,
    Unavailable,
}

impl GenerationOutcome {
    /// Creates a successful outcome.
    pub fn success(text: impl Into<String>) -> Self {
        GenerationOutcome::Success { text: text.into() }
    }

    /// Classifies free text: text carrying a sentinel token is not content.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        match SentinelKind::detect(&text) {
            Some(kind) => kind.into(),
            None => GenerationOutcome::Success { text },
        }
    }

    /// Returns the sentinel kind for non-content outcomes.
    pub fn sentinel(&self) -> Option<SentinelKind> {
        match self {
            GenerationOutcome::Success { .. } => None,
            GenerationOutcome::RateLimited => Some(SentinelKind::RateLimited),
            GenerationOutcome::Unavailable => Some(SentinelKind::Unavailable),
        }
    }

    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success { .. })
    }

    /// Returns the generated text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Success { text } => Some(text),
            _ => None,
        }
    }

    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            GenerationOutcome::Success { .. } => "success",
            GenerationOutcome::RateLimited => "rate_limited",
            GenerationOutcome::Unavailable => "unavailable",
        }
    }
}

impl From<SentinelKind> for GenerationOutcome {
    fn from(kind: SentinelKind) -> Self {
        match kind {
            SentinelKind::RateLimited => GenerationOutcome::RateLimited,
            SentinelKind::Unavailable => GenerationOutcome::Unavailable,
        }
    }
}

/// Anything that turns a [`GenerationRequest`] into a [`GenerationOutcome`].
///
/// Implementations never fail: every backend-level problem is expressed as
/// a sentinel outcome.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produces exactly one outcome for the request.
    async fn generate(&self, request: GenerationRequest) -> GenerationOutcome;

    /// Returns false when no backend could ever serve any purpose.
    fn has_any_route(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_detects_sentinels() {
        assert_eq!(
            GenerationOutcome::from_text("draft"),
            GenerationOutcome::success("draft")
        );
        assert_eq!(
            GenerationOutcome::from_text(format!("prefix {} suffix", UNAVAILABLE_TOKEN)),
            GenerationOutcome::Unavailable
        );
        assert_eq!(
            GenerationOutcome::from_text(RATE_LIMITED_TOKEN),
            GenerationOutcome::RateLimited
        );
    }

    #[test]
    fn test_sentinels_carry_no_text() {
        assert_eq!(GenerationOutcome::RateLimited.text(), None);
        assert_eq!(GenerationOutcome::Unavailable.text(), None);
        assert_eq!(
            GenerationOutcome::Unavailable.sentinel(),
            Some(SentinelKind::Unavailable)
        );
        assert_eq!(GenerationOutcome::success("x").sentinel(), None);
    }

    #[test]
    fn test_request_framing() {
        let request = GenerationRequest::validation("score this", "Confidence");
        assert_eq!(request.purpose, Purpose::Validation);
        assert_eq!(request.system_prompt(), "You are the Confidence agent.");
        let messages = request.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1], Message::user("score this"));
    }

    #[test]
    fn test_purpose_parse() {
        assert_eq!("Validation".parse::<Purpose>(), Ok(Purpose::Validation));
        assert!("other".parse::<Purpose>().is_err());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(GenerationOutcome::success("hi")).expect("serialize");
        assert_eq!(json["status"], "success");
        assert_eq!(json["text"], "hi");
        let json = serde_json::to_value(GenerationOutcome::RateLimited).expect("serialize");
        assert_eq!(json["status"], "rate_limited");
    }
}
