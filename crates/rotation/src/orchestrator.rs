//! One rotation run over every instance of the account.
//!
//! For each instance, in provider order: list its snapshots, delete the
//! oldest one, create a replacement, then hand the resulting [`Outcome`] to
//! the dispatcher before moving on. Nothing an instance does can abort the
//! run; every listed instance yields exactly one outcome.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use autosnap_compute::AuthenticatedClient;
use autosnap_core::{Instance, Outcome, Retention};
use autosnap_notify::Dispatcher;

use crate::policy;

/// Counts for the end-of-run log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub delete_failures: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Success { retention, .. } => {
                    summary.succeeded += 1;
                    if matches!(retention, Retention::DeleteFailed { .. }) {
                        summary.delete_failures += 1;
                    }
                }
                Outcome::Failure { .. } => summary.failed += 1,
            }
        }
        summary
    }
}

/// Runs the retain-one rotation across all instances.
pub struct Rotator {
    client: Arc<dyn AuthenticatedClient>,
    dispatcher: Arc<Dispatcher>,
    description: String,
}

impl Rotator {
    pub fn new(
        client: Arc<dyn AuthenticatedClient>,
        dispatcher: Arc<Dispatcher>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            client,
            dispatcher,
            description: description.into(),
        }
    }

    /// Process every currently listed instance once.
    ///
    /// A failure to list instances is logged and treated as an empty fleet;
    /// the next scheduled run is the retry.
    pub async fn run(&self) -> Vec<Outcome> {
        let started = Instant::now();
        info!("Snapshot rotation run started");

        let instances = match self.client.list_instances().await {
            Ok(instances) => instances,
            Err(e) => {
                error!(error = %e, "Failed to list instances, nothing rotated this run");
                Vec::new()
            }
        };

        let mut outcomes = Vec::with_capacity(instances.len());
        for instance in instances {
            let outcome = self.rotate(instance).await;
            self.dispatcher.notify(&outcome).await;
            outcomes.push(outcome);
        }

        let summary = RunSummary::from_outcomes(&outcomes);
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            delete_failures = summary.delete_failures,
            duration_ms = started.elapsed().as_millis() as u64,
            "Snapshot rotation run finished"
        );
        outcomes
    }

    /// Rotate one instance. Never fails; errors become the outcome.
    pub async fn rotate(&self, instance: Instance) -> Outcome {
        let retention = self.retire_oldest(&instance).await;

        match self
            .client
            .create_snapshot(&instance.id, None, &self.description)
            .await
        {
            Ok(snapshot) => {
                info!(
                    instance = %instance.label(),
                    snapshot_id = %snapshot.id,
                    "Snapshot rotated"
                );
                Outcome::Success {
                    instance,
                    snapshot,
                    retention,
                }
            }
            Err(e) => {
                error!(
                    instance = %instance.label(),
                    error = %e,
                    "Failed to create a snapshot"
                );
                Outcome::Failure {
                    instance,
                    reason: format!("creation failed: {e}"),
                }
            }
        }
    }

    async fn retire_oldest(&self, instance: &Instance) -> Retention {
        let snapshots = match self.client.list_snapshots(&instance.id).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(
                    instance_id = %instance.id,
                    error = %e,
                    "Could not list snapshots, creating without rotation"
                );
                return Retention::Unknown {
                    error: e.to_string(),
                };
            }
        };

        let Some(oldest) = policy::plan(&snapshots).delete else {
            info!(instance_id = %instance.id, "No existing snapshots to rotate");
            return Retention::NothingToDelete;
        };

        match self.client.delete_snapshot(&instance.id, &oldest.id).await {
            Ok(()) => Retention::Deleted {
                snapshot_id: oldest.id.clone(),
            },
            Err(e) => {
                warn!(
                    instance_id = %instance.id,
                    snapshot_id = %oldest.id,
                    error = %e,
                    "Failed to delete oldest snapshot, creating a new one anyway"
                );
                Retention::DeleteFailed {
                    snapshot_id: oldest.id.clone(),
                    error: e.to_string(),
                }
            }
        }
    }
}
