use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::EntityRef;
use super::extensions::Extensions;

/// The type of a directed edge between two entities.
///
/// `Blocks`/`BlockedBy` and `ParentOf`/`ChildOf` are inverse pairs;
/// `RelatesTo` and `Duplicates` are their own inverses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Blocks,
    BlockedBy,
    ParentOf,
    ChildOf,
    RelatesTo,
    Duplicates,
}

impl RelationType {
    /// Every relation type, for exhaustiveness-style tests and iteration.
    pub const ALL: [RelationType; 6] = [
        Self::Blocks,
        Self::BlockedBy,
        Self::ParentOf,
        Self::ChildOf,
        Self::RelatesTo,
        Self::Duplicates,
    ];

    /// The inverse edge type. Total over the enum; the compiler enforces
    /// that every variant has an entry.
    pub fn inverse(&self) -> Self {
        match self {
            Self::Blocks => Self::BlockedBy,
            Self::BlockedBy => Self::Blocks,
            Self::ParentOf => Self::ChildOf,
            Self::ChildOf => Self::ParentOf,
            Self::RelatesTo => Self::RelatesTo,
            Self::Duplicates => Self::Duplicates,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::BlockedBy => "blocked_by",
            Self::ParentOf => "parent_of",
            Self::ChildOf => "child_of",
            Self::RelatesTo => "relates_to",
            Self::Duplicates => "duplicates",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "blocks" => Some(Self::Blocks),
            "blocked_by" => Some(Self::BlockedBy),
            "parent_of" => Some(Self::ParentOf),
            "child_of" => Some(Self::ChildOf),
            "relates_to" => Some(Self::RelatesTo),
            "duplicates" => Some(Self::Duplicates),
            _ => None,
        }
    }
}

/// A typed directed edge between two entities.
///
/// Relations do not enforce uniqueness or forbid self-loops; callers may
/// store the same edge twice. The inverse row created by a bidirectional
/// insert is an independent record with no foreign-key link back, so deleting
/// one edge never cascades to its partner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: Uuid,
    pub source: EntityRef,
    pub target: EntityRef,
    pub relation_type: RelationType,
    pub description: Option<String>,
    pub extensions: Extensions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The two independent rows produced by a bidirectional insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidirectionalRelation {
    pub forward: Relation,
    pub inverse: Relation,
}

/// Input for updating a relation. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRelationInput {
    pub relation_type: Option<RelationType>,
    pub description: Option<String>,
    pub extensions: Option<Extensions>,
}
