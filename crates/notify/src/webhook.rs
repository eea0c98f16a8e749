//! Chat webhook notifier.
//!
//! Delivers each outcome as a Discord-compatible `{"embeds": [...]}` JSON
//! payload to the configured webhook URL.

use std::time::Duration;

use chrono::Local;

use autosnap_core::Outcome;

use crate::embed::WebhookPayload;
use crate::traits::{Notifier, NotifyError};

/// Posts rendered outcome embeds to a webhook endpoint.
#[derive(Debug)]
pub struct WebhookNotifier {
    /// Target URL. An empty URL disables delivery.
    url: String,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a notifier whose requests time out after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    async fn post(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(payload)?;

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: body_text,
            });
        }

        tracing::debug!(%status, "webhook notification delivered");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, outcome: &Outcome) -> Result<(), NotifyError> {
        if self.url.trim().is_empty() {
            tracing::warn!("Webhook URL not set. Notification not sent.");
            return Ok(());
        }
        self.post(&WebhookPayload::for_outcome(outcome, Local::now()))
            .await
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
