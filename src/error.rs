//! Error types for agentforge operations.
//!
//! Defines error types for the major subsystems:
//! - Backend calls issued by the request gateway
//! - Environment-driven configuration
//! - Session persistence
//! - Outbound notification delivery
//!
//! Backend errors never cross the gateway boundary; the gateway folds them
//! into a [`crate::llm::GenerationOutcome`].

use thiserror::Error;

/// Errors that can occur while talking to a text-generation backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Backend '{0}' requires a credential but none was supplied")]
    MissingCredential(String),
}

impl LlmError {
    /// Returns true when the backend reported an HTTP 429-equivalent condition.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            LlmError::RateLimited(_) => true,
            LlmError::ApiError { code, .. } => *code == 429,
            _ => false,
        }
    }
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors that can occur during session persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    RequestFailed(String),

    #[error("Notification rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Notification channel is not configured")]
    NotConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        assert!(LlmError::RateLimited("slow down".to_string()).is_rate_limit());
        assert!(LlmError::ApiError {
            code: 429,
            message: "too many".to_string()
        }
        .is_rate_limit());
        assert!(!LlmError::ApiError {
            code: 503,
            message: "down".to_string()
        }
        .is_rate_limit());
        assert!(!LlmError::RequestFailed("connection refused".to_string()).is_rate_limit());
        assert!(!LlmError::ParseError("bad json".to_string()).is_rate_limit());
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::InvalidValue {
            key: "GROQ_KEY_STRATEGY".to_string(),
            message: "unknown strategy 'random'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for GROQ_KEY_STRATEGY: unknown strategy 'random'"
        );
        assert_eq!(
            StoreError::SessionNotFound("abc".to_string()).to_string(),
            "Session 'abc' not found"
        );
    }
}
