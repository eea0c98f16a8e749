//! Routes outcomes to configured channels.
//!
//! The dispatcher delivers each outcome to every channel in turn.
//! Individual channel failures are logged and recorded, never raised:
//! notification is observability, not part of the rotation itself.

use autosnap_core::Outcome;

use crate::traits::{DispatchResult, Notifier};

/// Dispatches outcomes to a fixed set of channels.
pub struct Dispatcher {
    channels: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver one outcome to all channels, sequentially.
    ///
    /// Returns a result per channel. Never fails.
    pub async fn notify(&self, outcome: &Outcome) -> Vec<DispatchResult> {
        let instance_id = outcome.instance_id();

        if self.channels.is_empty() {
            tracing::debug!(instance_id, "No notification channels configured");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let start = std::time::Instant::now();
            let result = channel.send(outcome).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::info!(
                        instance_id,
                        channel = channel.channel_name(),
                        duration_ms,
                        "Notification delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::error!(
                        instance_id,
                        channel = channel.channel_name(),
                        error = %e,
                        duration_ms,
                        "Notification delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                instance_id: instance_id.to_string(),
                success,
                error,
                duration_ms,
            });
        }

        results
    }
}
