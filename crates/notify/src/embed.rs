//! Discord-style embed rendering of rotation outcomes.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use autosnap_core::{Outcome, Retention};

pub const SUCCESS_COLOR: u32 = 0x26A269;
pub const FAILURE_COLOR: u32 = 0xE01B24;

const SUCCESS_TITLE: &str = "Auto-snapshots BOT result";
const FAILURE_TITLE: &str = "Auto-snapshots BOT - Snapshot Creation Failed";
const THUMBNAIL_URL: &str =
    "https://auth.contabo.com/auth/resources/2rmpy/login/contabo/img/logo.png";
const FOOTER_TEXT: &str = "auto-snapshots";

/// Discord caps embed field values at 1024 characters.
const MAX_FIELD_CHARS: usize = 1024;

/// Body of one webhook POST.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

impl WebhookPayload {
    pub fn for_outcome<Tz>(outcome: &Outcome, now: DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self {
            embeds: vec![Embed::from_outcome(outcome, now)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    pub color: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl Embed {
    /// Render an outcome. `now` becomes the embed timestamp.
    pub fn from_outcome<Tz>(outcome: &Outcome, now: DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let timestamp = now.to_rfc3339();

        match outcome {
            Outcome::Success {
                instance,
                snapshot,
                retention,
            } => Self {
                title: SUCCESS_TITLE.to_string(),
                description: format!(
                    "Successfully created a snapshot for instance `{}`",
                    instance.label()
                ),
                fields: vec![
                    field("Snapshot ID", &snapshot.id),
                    field("Name", &snapshot.name),
                    field("Description", &snapshot.description),
                    field("Created at", &snapshot.created_date.to_rfc3339()),
                    field("Deleted at", &snapshot.auto_delete_date.to_rfc3339()),
                    field("Previous snapshot", &retention_text(retention)),
                ],
                thumbnail: Some(thumbnail()),
                timestamp,
                footer: Some(footer()),
                color: SUCCESS_COLOR,
            },
            Outcome::Failure { instance, reason } => Self {
                title: FAILURE_TITLE.to_string(),
                description: format!(
                    "Failed to create a snapshot for instance `{}`",
                    instance.label()
                ),
                fields: vec![
                    field("Instance ID", &instance.id),
                    field("Reason", reason),
                    field("Timestamp", &timestamp),
                ],
                thumbnail: Some(thumbnail()),
                timestamp,
                footer: Some(footer()),
                color: FAILURE_COLOR,
            },
        }
    }
}

/// One-line summary of what happened to the previous snapshot.
pub fn retention_text(retention: &Retention) -> String {
    match retention {
        Retention::NothingToDelete => "none to rotate".to_string(),
        Retention::Deleted { snapshot_id } => format!("deleted `{snapshot_id}`"),
        Retention::DeleteFailed { snapshot_id, error } => {
            format!("failed to delete `{snapshot_id}`: {error}")
        }
        Retention::Unknown { error } => format!("not checked, listing failed: {error}"),
    }
}

fn field(name: &str, value: &str) -> EmbedField {
    // Discord rejects empty field values.
    let value = if value.trim().is_empty() {
        "n/a".to_string()
    } else if value.chars().count() > MAX_FIELD_CHARS {
        let mut cut: String = value.chars().take(MAX_FIELD_CHARS - 3).collect();
        cut.push_str("...");
        cut
    } else {
        value.to_string()
    };

    EmbedField {
        name: name.to_string(),
        value,
        inline: false,
    }
}

fn thumbnail() -> EmbedImage {
    EmbedImage {
        url: THUMBNAIL_URL.to_string(),
    }
}

fn footer() -> EmbedFooter {
    EmbedFooter {
        text: FOOTER_TEXT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosnap_core::{Instance, Snapshot};
    use chrono::Utc;

    fn instance() -> Instance {
        Instance {
            id: "101".into(),
            name: "vmi101".into(),
            display_name: "web".into(),
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            id: "snap-new".into(),
            name: "20240501-030000".into(),
            description: "Auto-snapshots BOT".into(),
            created_date: Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap(),
            auto_delete_date: Utc.with_ymd_and_hms(2024, 5, 31, 3, 0, 0).unwrap(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 5).unwrap()
    }

    fn field_value<'a>(embed: &'a Embed, name: &str) -> &'a str {
        &embed
            .fields
            .iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("missing field {name}"))
            .value
    }

    #[test]
    fn success_embed_lists_snapshot_details() {
        let outcome = Outcome::Success {
            instance: instance(),
            snapshot: snapshot(),
            retention: Retention::Deleted {
                snapshot_id: "snap-old".into(),
            },
        };
        let embed = Embed::from_outcome(&outcome, now());

        assert_eq!(embed.title, SUCCESS_TITLE);
        assert_eq!(embed.color, SUCCESS_COLOR);
        assert_eq!(
            embed.description,
            "Successfully created a snapshot for instance `web - vmi101(101)`"
        );
        assert_eq!(field_value(&embed, "Snapshot ID"), "snap-new");
        assert_eq!(field_value(&embed, "Created at"), "2024-05-01T03:00:00+00:00");
        assert_eq!(field_value(&embed, "Deleted at"), "2024-05-31T03:00:00+00:00");
        assert_eq!(field_value(&embed, "Previous snapshot"), "deleted `snap-old`");
        assert_eq!(embed.timestamp, "2024-05-01T03:00:05+00:00");
    }

    #[test]
    fn failure_embed_carries_reason() {
        let outcome = Outcome::Failure {
            instance: instance(),
            reason: "creation failed: API error: 500".into(),
        };
        let embed = Embed::from_outcome(&outcome, now());

        assert_eq!(embed.title, FAILURE_TITLE);
        assert_eq!(embed.color, FAILURE_COLOR);
        assert_eq!(field_value(&embed, "Instance ID"), "101");
        assert_eq!(field_value(&embed, "Reason"), "creation failed: API error: 500");
        assert_eq!(field_value(&embed, "Timestamp"), embed.timestamp);
    }

    #[test]
    fn delete_failure_is_visible_on_success() {
        let outcome = Outcome::Success {
            instance: instance(),
            snapshot: snapshot(),
            retention: Retention::DeleteFailed {
                snapshot_id: "snap-old".into(),
                error: "API error: 409".into(),
            },
        };
        let embed = Embed::from_outcome(&outcome, now());
        assert_eq!(
            field_value(&embed, "Previous snapshot"),
            "failed to delete `snap-old`: API error: 409"
        );
    }

    #[test]
    fn empty_and_oversized_values_are_normalised() {
        let mut snap = snapshot();
        snap.description = String::new();
        let outcome = Outcome::Success {
            instance: instance(),
            snapshot: snap,
            retention: Retention::Unknown {
                error: "x".repeat(5000),
            },
        };
        let embed = Embed::from_outcome(&outcome, now());
        assert_eq!(field_value(&embed, "Description"), "n/a");
        let previous = field_value(&embed, "Previous snapshot");
        assert_eq!(previous.chars().count(), MAX_FIELD_CHARS);
        assert!(previous.ends_with("..."));
    }

    #[test]
    fn payload_serializes_discord_shape() {
        let outcome = Outcome::Failure {
            instance: instance(),
            reason: "creation failed".into(),
        };
        let payload = WebhookPayload::for_outcome(&outcome, now());
        let value = serde_json::to_value(&payload).unwrap();

        let embed = &value["embeds"][0];
        assert_eq!(embed["color"], 0xE01B24);
        assert_eq!(embed["fields"][0]["inline"], false);
        assert_eq!(embed["thumbnail"]["url"], THUMBNAIL_URL);
        assert_eq!(embed["footer"]["text"], FOOTER_TEXT);
    }
}
