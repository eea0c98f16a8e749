use async_trait::async_trait;

use autosnap_core::{Instance, Snapshot};

use crate::error::ComputeError;

/// Capability to call the compute provider on behalf of an authenticated
/// account. The rotation loop only depends on this trait, so tests can
/// substitute an in-memory fake.
#[async_trait]
pub trait AuthenticatedClient: Send + Sync {
    /// All instances of the account, in provider order.
    async fn list_instances(&self) -> Result<Vec<Instance>, ComputeError>;

    /// Snapshots currently held for one instance.
    async fn list_snapshots(&self, instance_id: &str) -> Result<Vec<Snapshot>, ComputeError>;

    /// Create a snapshot. `name` defaults to a local timestamp
    /// (`%Y%m%d-%H%M%S`) when `None`.
    async fn create_snapshot(
        &self,
        instance_id: &str,
        name: Option<&str>,
        description: &str,
    ) -> Result<Snapshot, ComputeError>;

    async fn delete_snapshot(&self, instance_id: &str, snapshot_id: &str)
        -> Result<(), ComputeError>;
}

/// Default snapshot name derived from the local wall clock.
pub fn default_snapshot_name<Tz>(now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    now.format("%Y%m%d-%H%M%S").to_string()
}
