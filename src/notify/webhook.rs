//! JSON webhook delivery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::NotifyError;

use super::{DeliveryReceipt, Notifier};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Posts `{to, subject, body}` to a fixed URL.
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(NotifyError::NotConfigured);
        }
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, target: &str, subject: &str, body: &str) -> Result<String, NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload {
                to: target,
                subject,
                body,
            })
            .send()
            .await
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(format!("Delivered to {}", target))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, target: &str, subject: &str, body: &str) -> DeliveryReceipt {
        match self.post(target, subject, body).await {
            Ok(detail) => DeliveryReceipt::delivered(detail),
            Err(e) => {
                tracing::warn!(recipient = target, error = %e, "Webhook delivery failed");
                DeliveryReceipt::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_url_is_not_configured() {
        assert!(matches!(
            WebhookNotifier::new("  "),
            Err(NotifyError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_failed_receipt() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook").expect("notifier");
        let receipt = notifier.deliver("a@b.com", "Final Draft: x", "body").await;
        assert!(!receipt.ok);
        assert!(receipt.detail.starts_with("Notification request failed"));
    }
}
