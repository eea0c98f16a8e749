//! Retain-one rotation policy.
//!
//! Before a new snapshot is created, the oldest existing one (by
//! `created_date`) is marked for deletion. Creation is always attempted,
//! whether or not anything was marked or the deletion succeeded.

use autosnap_core::Snapshot;

/// What one rotation should do for one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPlan<'a> {
    /// Snapshot to delete before creating the replacement.
    pub delete: Option<&'a Snapshot>,
}

/// Snapshot with the earliest `created_date`. Ties go to the one listed first.
pub fn oldest(snapshots: &[Snapshot]) -> Option<&Snapshot> {
    snapshots.iter().min_by_key(|s| s.created_date)
}

pub fn plan(snapshots: &[Snapshot]) -> RotationPlan<'_> {
    RotationPlan {
        delete: oldest(snapshots),
    }
}
