use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::EntityRef;

/// A bounded unit of work correlating a run of history entries.
///
/// At most one session may be active (`ended_at == None`) at a time across
/// the whole database. A session points at the entity currently being worked
/// on and an optional free-form phase label ("planning", "review", ...);
/// both may change while the session is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub actor: String,
    pub active_entity: Option<EntityRef>,
    pub phase: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Elapsed time; for an active session, measured up to now.
    pub fn duration(&self) -> Duration {
        self.ended_at.unwrap_or_else(Utc::now) - self.started_at
    }
}

/// Input for starting a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionInput {
    pub actor: String,
    pub active_entity: Option<EntityRef>,
    pub phase: Option<String>,
}
