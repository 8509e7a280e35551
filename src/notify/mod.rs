//! Outbound delivery of finished documents.
//!
//! A [`Notifier`] is invoked at most once per run, after the pipeline has
//! terminated. Delivery problems never fail the run; they come back as a
//! [`DeliveryReceipt`] with `ok == false`.

pub mod format;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use format::{format_delivery_body, notification_subject, EMPTY_BODY};
pub use webhook::WebhookNotifier;

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub ok: bool,
    pub detail: String,
}

impl DeliveryReceipt {
    pub fn delivered(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, target: &str, subject: &str, body: &str) -> DeliveryReceipt;
}

/// Records deliveries through tracing instead of sending them.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, target: &str, subject: &str, body: &str) -> DeliveryReceipt {
        tracing::info!(
            recipient = target,
            subject = subject,
            body_len = body.len(),
            "Dry-run delivery"
        );
        DeliveryReceipt::delivered(format!("Logged delivery to {}", target))
    }
}

/// Webhook notifier when `webhook_url` is set and `enabled`, log notifier otherwise.
pub fn build_notifier(
    enabled: bool,
    webhook_url: Option<&str>,
) -> Result<Arc<dyn Notifier>, crate::error::NotifyError> {
    match (enabled, webhook_url) {
        (true, Some(url)) => Ok(Arc::new(WebhookNotifier::new(url)?)),
        (true, None) => Err(crate::error::NotifyError::NotConfigured),
        (false, _) => Ok(Arc::new(LogNotifier)),
    }
}
