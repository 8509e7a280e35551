//! OpenAI-compatible chat completions backend (Groq).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{http_client, read_success, require_credential, settings_base, Backend};
use crate::error::LlmError;
use crate::llm::config::{BackendKind, BackendSettings};
use crate::llm::credentials::Credential;
use crate::llm::types::{GenerationRequest, Message};

/// Sampling temperature for drafting calls.
const TEMPERATURE: f64 = 0.3;

/// Chat completions client for Groq's OpenAI-compatible endpoint.
pub struct OpenAiCompatBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl OpenAiCompatBackend {
    /// Creates a backend from its settings.
    pub fn new(settings: &BackendSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(settings.timeout)?,
            base_url: settings_base(settings),
            model: settings.model.clone(),
        })
    }

    fn build_request(&self, request: &GenerationRequest) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            messages: request.messages(),
            temperature: TEMPERATURE,
        }
    }
}

#[async_trait]
impl Backend for OpenAiCompatBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Groq
    }

    async fn complete(
        &self,
        credential: Option<&Credential>,
        request: &GenerationRequest,
    ) -> Result<String, LlmError> {
        let credential = require_credential(self.kind(), credential)?;
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", credential.secret()))
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let body: ApiResponse = read_success(response).await?;
        extract_text(body)
    }
}

fn extract_text(body: ApiResponse) -> Result<String, LlmError> {
    body.choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_string())
        .ok_or_else(|| LlmError::ParseError("response contained no choices".to_string()))
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: String,
}
