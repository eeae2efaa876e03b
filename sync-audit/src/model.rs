use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Upper bound on the stored object representation.
pub const OBJECT_REPR_MAX: usize = 200;
/// Upper bound on the stored log message.
pub const MESSAGE_MAX: usize = 511;

/// One reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSession {
    pub id: Uuid,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Operator-defined custom field values, stored as-is.
    pub custom_field_data: Value,
    pub dry_run: bool,
    /// The structured diff the run produced.
    pub diff: Value,
    /// Reference to the job execution that ran the sync, when one exists.
    pub job_result_id: Option<Uuid>
}

impl SyncSession {
    pub fn new(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created: now,
            last_updated: now,
            custom_field_data: Value::Object(serde_json::Map::new()),
            dry_run,
            diff: Value::Object(serde_json::Map::new()),
            job_result_id: None
        }
    }
}

/// What the reconciliation decided to do with one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncLogAction {
    NoChange,
    Create,
    Update,
    Delete
}

impl SyncLogAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoChange => "no-change",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete"
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "no-change" => Some(Self::NoChange),
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None
        }
    }
}

/// How the action turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncLogStatus {
    Success,
    #[serde(rename = "failure")]
    Failed,
    #[serde(rename = "error")]
    Errored
}

impl SyncLogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failure",
            Self::Errored => "error"
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failed),
            "error" => Some(Self::Errored),
            _ => None
        }
    }
}

/// One audited object change within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: Uuid,
    pub sync_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: SyncLogAction,
    pub status: SyncLogStatus,
    pub diff: Value,
    /// Dotted content-type of the changed object, e.g. `dcim.device`.
    pub changed_object_type: Option<String>,
    pub changed_object_id: Option<Uuid>,
    pub object_repr: String,
    pub message: String,
    /// Reference to the change record produced by the target system.
    pub object_change_id: Option<Uuid>
}

impl SyncLogEntry {
    /// A fresh entry stamped with the current time. The representation and
    /// message are truncated to their storage bounds.
    pub fn new(
        sync_id: Uuid,
        action: SyncLogAction,
        status: SyncLogStatus,
        object_repr: &str,
        message: &str
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sync_id,
            timestamp: Utc::now(),
            action,
            status,
            diff: Value::Object(serde_json::Map::new()),
            changed_object_type: None,
            changed_object_id: None,
            object_repr: truncate(object_repr, OBJECT_REPR_MAX),
            message: truncate(message, MESSAGE_MAX),
            object_change_id: None
        }
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_and_status_round_trip_their_wire_values() {
        for action in [
            SyncLogAction::NoChange,
            SyncLogAction::Create,
            SyncLogAction::Update,
            SyncLogAction::Delete
        ] {
            assert_eq!(SyncLogAction::parse(action.as_str()), Some(action));
        }
        for status in [
            SyncLogStatus::Success,
            SyncLogStatus::Failed,
            SyncLogStatus::Errored
        ] {
            assert_eq!(SyncLogStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SyncLogAction::parse("noop"), None);
        assert_eq!(SyncLogStatus::parse(""), None);
    }

    #[test]
    fn test_new_entry_truncates_repr_and_message() {
        let long = "x".repeat(1000);
        let entry = SyncLogEntry::new(
            Uuid::new_v4(),
            SyncLogAction::Create,
            SyncLogStatus::Success,
            &long,
            &long
        );
        assert_eq!(entry.object_repr.chars().count(), OBJECT_REPR_MAX);
        assert_eq!(entry.message.chars().count(), MESSAGE_MAX);
    }

    #[test]
    fn test_session_starts_with_empty_json_fields() {
        let session = SyncSession::new(true);
        assert!(session.dry_run);
        assert_eq!(session.diff, serde_json::json!({}));
        assert_eq!(session.custom_field_data, serde_json::json!({}));
        assert_eq!(session.created, session.last_updated);
        assert_eq!(session.job_result_id, None);
    }
}
