use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of work item an [`EntityRef`] points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Feature,
    Story,
    Task,
    AcceptanceCriteria,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Story => "story",
            Self::Task => "task",
            Self::AcceptanceCriteria => "acceptance_criteria",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "feature" => Some(Self::Feature),
            "story" => Some(Self::Story),
            "task" => Some(Self::Task),
            "acceptance_criteria" => Some(Self::AcceptanceCriteria),
            _ => None,
        }
    }
}

/// An opaque reference to an entity owned by the external entity store.
///
/// Relations, history entries, sessions, and annotations all point at
/// entities only through this pair; the crate never dereferences one except
/// through the [`EntityStore`](crate::store::EntityStore) contract. Two refs
/// are equal exactly when both kind and id match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id)
    }
}
