//! Provider records and per-instance rotation outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A virtual machine as listed by the compute provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(rename = "instanceId", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
}

impl Instance {
    /// Human-readable label used in logs and notifications: `display - name(id)`.
    pub fn label(&self) -> String {
        format!("{} - {}({})", self.display_name, self.name, self.id)
    }
}

/// A point-in-time disk image belonging to one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(rename = "snapshotId", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_date: DateTime<Utc>,
    pub auto_delete_date: DateTime<Utc>,
}

/// What happened to the previously retained snapshot during one rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Retention {
    /// The instance had no snapshots.
    NothingToDelete,
    /// The oldest snapshot was deleted before creating the new one.
    Deleted { snapshot_id: String },
    /// Deleting the oldest snapshot failed; it is still present.
    DeleteFailed { snapshot_id: String, error: String },
    /// The snapshot listing failed, so nothing was considered for deletion.
    Unknown { error: String },
}

/// Result of one rotation attempt for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        instance: Instance,
        snapshot: Snapshot,
        retention: Retention,
    },
    Failure {
        instance: Instance,
        reason: String,
    },
}

impl Outcome {
    pub fn instance(&self) -> &Instance {
        match self {
            Outcome::Success { instance, .. } | Outcome::Failure { instance, .. } => instance,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance().id
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Provider ids arrive as JSON numbers for instances and strings for
/// snapshots; both are kept as strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Uint(n) => n.to_string(),
    })
}
