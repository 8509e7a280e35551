//! Google Gemini `generateContent` backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{http_client, read_success, require_credential, settings_base, Backend};
use crate::error::LlmError;
use crate::llm::config::{BackendKind, BackendSettings};
use crate::llm::credentials::Credential;
use crate::llm::types::GenerationRequest;

pub struct GeminiBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(settings.timeout)?,
            base_url: settings_base(settings),
            model: settings.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(request: &GenerationRequest) -> ApiRequest {
        ApiRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: request.system_prompt(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
        }
    }
}

#[async_trait]
impl Backend for GeminiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gemini
    }

    async fn complete(
        &self,
        credential: Option<&Credential>,
        request: &GenerationRequest,
    ) -> Result<String, LlmError> {
        let credential = require_credential(self.kind(), credential)?;

        let response = self
            .client
            .post(format!("{}?key={}", self.endpoint(), credential.secret()))
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let body: ApiResponse = read_success(response).await?;
        extract_text(body)
    }
}

/// Joins the text parts of the first candidate.
fn extract_text(body: ApiResponse) -> Result<String, LlmError> {
    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::ParseError("response contained no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::ParseError(
            "candidate contained no text".to_string(),
        ));
    }
    Ok(text.trim().to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_system_instruction() {
        let payload = serde_json::to_value(GeminiBackend::build_request(
            &GenerationRequest::validation("rate this", "Confidence"),
        ))
        .expect("serialize");
        assert_eq!(
            payload["systemInstruction"]["parts"][0]["text"],
            "You are the Confidence agent."
        );
        assert!(payload["systemInstruction"].get("role").is_none());
        assert_eq!(payload["contents"][0]["role"], "user");
        assert_eq!(payload["contents"][0]["parts"][0]["text"], "rate this");
    }

    #[test]
    fn test_endpoint() {
        let backend =
            GeminiBackend::new(&BackendSettings::defaults(BackendKind::Gemini)).expect("client");
        assert_eq!(
            backend.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body: ApiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello "},{"text":"world"}]}}]}"#,
        )
        .expect("parse");
        assert_eq!(extract_text(body).expect("text"), "Hello world");

        let blocked: ApiResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).expect("parse");
        assert!(matches!(extract_text(blocked), Err(LlmError::ParseError(_))));
    }
}
