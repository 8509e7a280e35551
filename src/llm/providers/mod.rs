//! Concrete text-generation backends.
//!
//! Every backend performs exactly one HTTP round trip per `complete` call and
//! maps the response onto [`LlmError`]. Retry, rotation and fallback policy
//! live in the gateway, never here.

pub mod gemini;
pub mod ollama;
pub mod openai_compat;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::config::{BackendKind, BackendSettings, GatewayConfig};
use super::credentials::Credential;
use super::types::GenerationRequest;
use crate::error::LlmError;

pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
pub use openai_compat::OpenAiCompatBackend;

/// A single text-generation service.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Returns false for backends that need no API key.
    fn requires_credential(&self) -> bool {
        true
    }

    /// Issues one call and returns the generated text.
    async fn complete(
        &self,
        credential: Option<&Credential>,
        request: &GenerationRequest,
    ) -> Result<String, LlmError>;
}

/// Builds the HTTP backend for every kind in `config`.
pub fn build_backends(config: &GatewayConfig) -> Result<Vec<Arc<dyn Backend>>, LlmError> {
    let mut backends: Vec<Arc<dyn Backend>> = Vec::with_capacity(BackendKind::ALL.len());
    for kind in BackendKind::ALL {
        let settings = config.backend(kind);
        let backend: Arc<dyn Backend> = match kind {
            BackendKind::Groq => Arc::new(OpenAiCompatBackend::new(settings)?),
            BackendKind::Gemini => Arc::new(GeminiBackend::new(settings)?),
            BackendKind::Ollama => Arc::new(OllamaBackend::new(settings)?),
        };
        backends.push(backend);
    }
    Ok(backends)
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::RequestFailed(format!("failed to build HTTP client: {}", e)))
}

pub(crate) fn require_credential<'a>(
    settings_kind: BackendKind,
    credential: Option<&'a Credential>,
) -> Result<&'a Credential, LlmError> {
    credential.ok_or_else(|| LlmError::MissingCredential(settings_kind.to_string()))
}

/// Error envelope shared by OpenAI-style and Google-style APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Maps a non-2xx response onto an [`LlmError`].
pub(crate) fn error_from_status(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited(message)
    } else {
        LlmError::ApiError {
            code: status.as_u16(),
            message,
        }
    }
}

/// Reads a response, mapping failures onto [`LlmError`].
pub(crate) async fn read_success<T>(response: reqwest::Response) -> Result<T, LlmError>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        return Err(error_from_status(status, &body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))
}

pub(crate) fn settings_base(settings: &BackendSettings) -> String {
    settings.base_url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_status_maps_429_to_rate_limited() {
        let err = error_from_status(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"quota exceeded"}}"#,
        );
        assert!(matches!(err, LlmError::RateLimited(ref m) if m == "quota exceeded"));
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_error_from_status_keeps_raw_body() {
        let err = error_from_status(StatusCode::BAD_GATEWAY, "upstream down\n");
        match err {
            LlmError::ApiError { code, message } => {
                assert_eq!(code, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_build_backends_covers_every_kind() {
        let backends = build_backends(&GatewayConfig::default()).expect("clients build");
        let kinds: Vec<BackendKind> = backends.iter().map(|b| b.kind()).collect();
        assert_eq!(kinds, BackendKind::ALL.to_vec());
        assert!(!backends[2].requires_credential());
    }

    #[test]
    fn test_require_credential() {
        let err = require_credential(BackendKind::Groq, None).expect_err("missing");
        assert!(matches!(err, LlmError::MissingCredential(ref b) if b == "groq"));
    }
}
