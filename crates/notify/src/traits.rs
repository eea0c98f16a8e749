//! Notifier trait definition and shared error types.

use autosnap_core::Outcome;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one rotation outcome through this channel.
    async fn send(&self, outcome: &Outcome) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "webhook").
    fn channel_name(&self) -> &str;
}

/// Result of delivering an outcome to a single channel.
#[derive(Debug)]
pub struct DispatchResult {
    pub channel: String,
    pub instance_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
