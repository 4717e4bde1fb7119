use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::EntityRef;
use super::extensions::Extensions;

/// A piece of knowledge about an entity, weighted by confidence.
///
/// `dimension` names the axis the knowledge lives on (e.g. "architecture",
/// "risk"), `category` a bucket within it. `confidence` is always within
/// [0,1]; it moves either by direct overwrite or by the weighted blend in
/// [`Database::update_annotation_confidence`](crate::db::Database::update_annotation_confidence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeAnnotation {
    pub id: Uuid,
    pub entity: EntityRef,
    pub dimension: String,
    pub category: String,
    pub content: String,
    pub confidence: f64,
    /// Free-form pointer to supporting material (commit, log excerpt, URL).
    pub evidence: Option<String>,
    pub extensions: Extensions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnnotationInput {
    pub entity: EntityRef,
    pub dimension: String,
    pub category: String,
    pub content: String,
    /// Initial confidence in [0,1].
    pub confidence: f64,
    pub evidence: Option<String>,
    #[serde(default)]
    pub extensions: Extensions,
}

/// Input for directly overwriting annotation fields, bypassing the blend
/// formula. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAnnotationInput {
    pub category: Option<String>,
    pub content: Option<String>,
    pub confidence: Option<f64>,
    pub evidence: Option<String>,
    pub extensions: Option<Extensions>,
}
