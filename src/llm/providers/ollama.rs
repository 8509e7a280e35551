//! Local Ollama `/api/chat` backend.
//!
//! Ollama runs without an API key; the gateway treats it as having a single
//! implicit credential.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{http_client, read_success, settings_base, Backend};
use crate::error::LlmError;
use crate::llm::config::{BackendKind, BackendSettings};
use crate::llm::credentials::Credential;
use crate::llm::types::{GenerationRequest, Message};

pub struct OllamaBackend {
    client: Client,
    host: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(settings.timeout)?,
            host: settings_base(settings),
            model: settings.model.clone(),
        })
    }

    fn build_request(&self, request: &GenerationRequest) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            messages: request.messages(),
            stream: false,
        }
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    fn requires_credential(&self) -> bool {
        false
    }

    async fn complete(
        &self,
        _credential: Option<&Credential>,
        request: &GenerationRequest,
    ) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let body: ApiResponse = read_success(response).await?;
        let text = body.message.map(|m| m.content).unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LlmError::ParseError(
                "ollama returned an empty message".to_string(),
            ));
        }
        Ok(text.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    message: Option<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_disables_streaming() {
        let backend =
            OllamaBackend::new(&BackendSettings::defaults(BackendKind::Ollama)).expect("client");
        let payload =
            serde_json::to_value(backend.build_request(&GenerationRequest::generation("hi", "Writer")))
                .expect("serialize");
        assert_eq!(payload["stream"], false);
        assert_eq!(payload["model"], "llama3");
        assert_eq!(payload["messages"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_needs_no_credential() {
        let backend =
            OllamaBackend::new(&BackendSettings::defaults(BackendKind::Ollama)).expect("client");
        assert!(!backend.requires_credential());
    }
}
