use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::entity::EntityRef;

/// What kind of state transition a history entry records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Updated,
    Deleted,
    StatusChanged,
    Verified,
    Assigned,
    Commented,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::StatusChanged => "status_changed",
            Self::Verified => "verified",
            Self::Assigned => "assigned",
            Self::Commented => "commented",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "deleted" => Some(Self::Deleted),
            "status_changed" => Some(Self::StatusChanged),
            "verified" => Some(Self::Verified),
            "assigned" => Some(Self::Assigned),
            "commented" => Some(Self::Commented),
            _ => None,
        }
    }

    /// Actions whose entries carry a field-level diff.
    pub fn carries_diff(&self) -> bool {
        matches!(self, Self::Updated | Self::StatusChanged)
    }
}

/// One field's before/after values inside a diff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldChange {
    pub from: Value,
    pub to: Value,
}

/// An append-only record of one state transition on an entity.
///
/// History is like `git log` for a work item: it answers "what changed, who
/// changed it, and during which session?" Entries are immutable once written;
/// the database exposes no update or delete for them.
///
/// `changes` is populated only for diff-carrying actions (`Updated`,
/// `StatusChanged`); `previous_state` holds a full snapshot only for
/// `Created` (the state as created) and `Deleted` (the state destroyed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub entity: EntityRef,
    pub action: HistoryAction,
    /// Who made the change (agent name or human name).
    pub actor: String,
    pub changes: BTreeMap<String, FieldChange>,
    pub previous_state: Option<Value>,
    /// Human-readable one-line description, generated per action.
    pub summary: String,
    /// The session this change happened under, if any.
    pub session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
