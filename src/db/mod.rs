mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::Value;
use uuid::Uuid;

use crate::audit;
use crate::error::Error;
use crate::events::{ChangeEvent, ChangeKind, EventBus};
use crate::models::*;
use crate::Result;

/// Storage for the four record sets this crate owns: relations, history,
/// sessions, and annotations.
///
/// All operations are synchronous local calls. The connection mutex
/// serializes in-process access; concurrent processes sharing a file rely on
/// SQLite's WAL journaling. After each committed mutation a [`ChangeEvent`]
/// is published on the shared event bus, outside the connection lock.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    events: Arc<EventBus>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path.parent().ok_or_else(|| {
            Error::InvalidInput(format!("database path {} has no parent directory", path.display()))
        })?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            events: Arc::new(EventBus::new()),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "worktrail")
            .ok_or_else(|| Error::State("could not determine data directory".to_string()))?;
        let db_path = dirs.data_dir().join("worktrail.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            events: Arc::new(EventBus::new()),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    /// The bus on which committed mutations are announced.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn publish(&self, table: &'static str, kind: ChangeKind, id: Uuid) {
        self.events.publish(&ChangeEvent::new(table, kind, id));
    }

    // ============================================================
    // Relation graph operations
    // ============================================================

    /// Insert a typed directed edge.
    ///
    /// No uniqueness invariant: the same edge may be created twice, and
    /// self-loops are not rejected.
    pub fn create_relation(
        &self,
        source: EntityRef,
        target: EntityRef,
        relation_type: RelationType,
        description: Option<String>,
    ) -> Result<Relation> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "INSERT INTO relations (id, source_kind, source_id, target_kind, target_id, relation_type, description, extensions, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    id.to_string(),
                    source.kind.as_str(),
                    source.id.to_string(),
                    target.kind.as_str(),
                    target.id.to_string(),
                    relation_type.as_str(),
                    &description,
                    "{}",
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ),
            )?;
        }

        self.publish("relations", ChangeKind::Created, id);

        Ok(Relation {
            id,
            source,
            target,
            relation_type,
            description,
            extensions: Extensions::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Insert an edge and its inverse as two independent rows.
    ///
    /// The rows carry no link to each other: deleting one never cascades to
    /// its partner. The two inserts are not atomic; a failure after the
    /// forward insert leaves it in place for the caller to reconcile.
    pub fn create_bidirectional_relation(
        &self,
        source: EntityRef,
        target: EntityRef,
        relation_type: RelationType,
        description: Option<String>,
    ) -> Result<BidirectionalRelation> {
        let forward = self.create_relation(source, target, relation_type, description.clone())?;
        let inverse =
            self.create_relation(target, source, relation_type.inverse(), description)?;
        Ok(BidirectionalRelation { forward, inverse })
    }

    pub fn get_relation(&self, id: Uuid) -> Result<Option<Relation>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, source_kind, source_id, target_kind, target_id, relation_type, description, extensions, created_at, updated_at
             FROM relations WHERE id = ?",
        )?;

        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(relation_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn relations_by_source(&self, source: EntityRef) -> Result<Vec<Relation>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, source_kind, source_id, target_kind, target_id, relation_type, description, extensions, created_at, updated_at
             FROM relations WHERE source_kind = ? AND source_id = ? ORDER BY created_at",
        )?;

        let relations = stmt
            .query_map(
                (source.kind.as_str(), source.id.to_string()),
                relation_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(relations)
    }

    pub fn relations_by_target(&self, target: EntityRef) -> Result<Vec<Relation>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, source_kind, source_id, target_kind, target_id, relation_type, description, extensions, created_at, updated_at
             FROM relations WHERE target_kind = ? AND target_id = ? ORDER BY created_at",
        )?;

        let relations = stmt
            .query_map(
                (target.kind.as_str(), target.id.to_string()),
                relation_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(relations)
    }

    /// Relations where the entity appears on either side.
    pub fn relations_for_entity(&self, entity: EntityRef) -> Result<Vec<Relation>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, source_kind, source_id, target_kind, target_id, relation_type, description, extensions, created_at, updated_at
             FROM relations
             WHERE (source_kind = ? AND source_id = ?) OR (target_kind = ? AND target_id = ?)
             ORDER BY created_at",
        )?;

        let kind = entity.kind.as_str();
        let id = entity.id.to_string();
        let relations = stmt
            .query_map((kind, &id, kind, &id), relation_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(relations)
    }

    pub fn relations_by_type(&self, relation_type: RelationType) -> Result<Vec<Relation>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, source_kind, source_id, target_kind, target_id, relation_type, description, extensions, created_at, updated_at
             FROM relations WHERE relation_type = ? ORDER BY created_at",
        )?;

        let relations = stmt
            .query_map([relation_type.as_str()], relation_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(relations)
    }

    /// Relations that block `entity`: `target = entity` and type `blocks`.
    pub fn find_blockers(&self, entity: EntityRef) -> Result<Vec<Relation>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, source_kind, source_id, target_kind, target_id, relation_type, description, extensions, created_at, updated_at
             FROM relations WHERE target_kind = ? AND target_id = ? AND relation_type = 'blocks'
             ORDER BY created_at",
        )?;

        let relations = stmt
            .query_map(
                (entity.kind.as_str(), entity.id.to_string()),
                relation_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(relations)
    }

    /// Overwrite a relation's type, description, or extensions.
    pub fn update_relation(&self, id: Uuid, input: UpdateRelationInput) -> Result<Relation> {
        let existing = self
            .get_relation(id)?
            .ok_or_else(|| Error::not_found("relation", id))?;

        let now = Utc::now();
        let relation_type = input.relation_type.unwrap_or(existing.relation_type);
        let description = input.description.or(existing.description);
        let extensions = input.extensions.unwrap_or(existing.extensions);

        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "UPDATE relations SET relation_type = ?, description = ?, extensions = ?, updated_at = ? WHERE id = ?",
                (
                    relation_type.as_str(),
                    &description,
                    serde_json::to_string(&extensions)?,
                    now.to_rfc3339(),
                    id.to_string(),
                ),
            )?;
        }

        self.publish("relations", ChangeKind::Updated, id);

        Ok(Relation {
            id,
            source: existing.source,
            target: existing.target,
            relation_type,
            description,
            extensions,
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    /// Remove exactly one relation row.
    pub fn delete_relation(&self, id: Uuid) -> Result<()> {
        let rows = {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute("DELETE FROM relations WHERE id = ?", [id.to_string()])?
        };
        if rows == 0 {
            return Err(Error::not_found("relation", id));
        }
        self.publish("relations", ChangeKind::Deleted, id);
        Ok(())
    }

    // ============================================================
    // Audit trail operations
    // ============================================================

    /// Append an immutable history entry.
    ///
    /// For diff-carrying actions (`Updated`, `StatusChanged`) the entry's
    /// `changes` is the shallow diff of `before` vs `after`. `Created` keeps
    /// the `after` snapshot and `Deleted` the `before` snapshot as
    /// `previous_state`. The session id is an explicit argument; nothing here
    /// reads ambient session state.
    pub fn append_history(
        &self,
        entity: EntityRef,
        action: HistoryAction,
        actor: &str,
        before: Option<&Value>,
        after: Option<&Value>,
        session_id: Option<Uuid>,
    ) -> Result<HistoryEntry> {
        let changes = match (action.carries_diff(), before, after) {
            (true, Some(before), Some(after)) => audit::diff_snapshots(before, after),
            _ => Default::default(),
        };
        let previous_state = match action {
            HistoryAction::Created => after.cloned(),
            HistoryAction::Deleted => before.cloned(),
            _ => None,
        };
        let summary = audit::summarize(action, &entity, actor, &changes);

        let id = Uuid::new_v4();
        let now = Utc::now();
        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "INSERT INTO history (id, entity_kind, entity_id, action, actor, changes, previous_state, summary, session_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    id.to_string(),
                    entity.kind.as_str(),
                    entity.id.to_string(),
                    action.as_str(),
                    actor,
                    serde_json::to_string(&changes)?,
                    previous_state
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    &summary,
                    session_id.map(|u| u.to_string()),
                    now.to_rfc3339(),
                ),
            )?;
        }

        self.publish("history", ChangeKind::Created, id);

        Ok(HistoryEntry {
            id,
            entity,
            action,
            actor: actor.to_string(),
            changes,
            previous_state,
            summary,
            session_id,
            created_at: now,
        })
    }

    pub fn history_for_entity(&self, entity: EntityRef) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, entity_kind, entity_id, action, actor, changes, previous_state, summary, session_id, created_at
             FROM history WHERE entity_kind = ? AND entity_id = ? ORDER BY created_at DESC",
        )?;

        let entries = stmt
            .query_map(
                (entity.kind.as_str(), entity.id.to_string()),
                history_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    pub fn history_by_actor(&self, actor: &str) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, entity_kind, entity_id, action, actor, changes, previous_state, summary, session_id, created_at
             FROM history WHERE actor = ? ORDER BY created_at DESC",
        )?;

        let entries = stmt
            .query_map([actor], history_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    pub fn history_by_action(&self, action: HistoryAction) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, entity_kind, entity_id, action, actor, changes, previous_state, summary, session_id, created_at
             FROM history WHERE action = ? ORDER BY created_at DESC",
        )?;

        let entries = stmt
            .query_map([action.as_str()], history_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    pub fn history_by_session(&self, session_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, entity_kind, entity_id, action, actor, changes, previous_state, summary, session_id, created_at
             FROM history WHERE session_id = ? ORDER BY created_at DESC",
        )?;

        let entries = stmt
            .query_map([session_id.to_string()], history_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Entries created in `[from, to]`, oldest first.
    pub fn history_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, entity_kind, entity_id, action, actor, changes, previous_state, summary, session_id, created_at
             FROM history WHERE created_at >= ? AND created_at <= ? ORDER BY created_at",
        )?;

        let entries = stmt
            .query_map((from.to_rfc3339(), to.to_rfc3339()), history_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    // ============================================================
    // Session operations
    // ============================================================

    /// Start a session. At most one session may be active across the whole
    /// database, regardless of actor.
    pub fn start_session(&self, input: StartSessionInput) -> Result<Session> {
        if let Some(active) = self.find_active_session()? {
            return Err(Error::SessionAlreadyActive(active.id));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "INSERT INTO sessions (id, actor, entity_kind, entity_id, phase, started_at, ended_at)
                 VALUES (?, ?, ?, ?, ?, ?, NULL)",
                (
                    id.to_string(),
                    &input.actor,
                    input.active_entity.map(|e| e.kind.as_str()),
                    input.active_entity.map(|e| e.id.to_string()),
                    &input.phase,
                    now.to_rfc3339(),
                ),
            )?;
        }

        tracing::debug!(session = %id, actor = %input.actor, "session started");
        self.publish("sessions", ChangeKind::Created, id);

        Ok(Session {
            id,
            actor: input.actor,
            active_entity: input.active_entity,
            phase: input.phase,
            started_at: now,
            ended_at: None,
        })
    }

    /// End the active session. Fails if no session is active or if `id` is
    /// not the active one.
    pub fn end_session(&self, id: Uuid) -> Result<Session> {
        let active = self
            .find_active_session()?
            .ok_or_else(|| Error::State("no session is active".to_string()))?;
        if active.id != id {
            return Err(Error::State(format!(
                "session {id} is not the active session ({} is)",
                active.id
            )));
        }

        let now = Utc::now();
        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "UPDATE sessions SET ended_at = ? WHERE id = ?",
                (now.to_rfc3339(), id.to_string()),
            )?;
        }

        tracing::debug!(session = %id, "session ended");
        self.publish("sessions", ChangeKind::Updated, id);

        Ok(Session {
            ended_at: Some(now),
            ..active
        })
    }

    /// Point the session at a different entity.
    pub fn switch_session_entity(&self, id: Uuid, entity: EntityRef) -> Result<Session> {
        let existing = self
            .get_session(id)?
            .ok_or_else(|| Error::not_found("session", id))?;

        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "UPDATE sessions SET entity_kind = ?, entity_id = ? WHERE id = ?",
                (entity.kind.as_str(), entity.id.to_string(), id.to_string()),
            )?;
        }

        self.publish("sessions", ChangeKind::Updated, id);

        Ok(Session {
            active_entity: Some(entity),
            ..existing
        })
    }

    pub fn set_session_phase(&self, id: Uuid, phase: impl Into<String>) -> Result<Session> {
        let existing = self
            .get_session(id)?
            .ok_or_else(|| Error::not_found("session", id))?;
        let phase = phase.into();

        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "UPDATE sessions SET phase = ? WHERE id = ?",
                (&phase, id.to_string()),
            )?;
        }

        self.publish("sessions", ChangeKind::Updated, id);

        Ok(Session {
            phase: Some(phase),
            ..existing
        })
    }

    pub fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, actor, entity_kind, entity_id, phase, started_at, ended_at
             FROM sessions WHERE id = ?",
        )?;

        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(session_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn find_active_session(&self) -> Result<Option<Session>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, actor, entity_kind, entity_id, phase, started_at, ended_at
             FROM sessions WHERE ended_at IS NULL LIMIT 1",
        )?;

        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(session_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn all_sessions(&self) -> Result<Vec<Session>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, actor, entity_kind, entity_id, phase, started_at, ended_at
             FROM sessions ORDER BY started_at DESC",
        )?;

        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    // ============================================================
    // Knowledge annotation operations
    // ============================================================

    pub fn create_annotation(&self, input: CreateAnnotationInput) -> Result<KnowledgeAnnotation> {
        if !(0.0..=1.0).contains(&input.confidence) {
            return Err(Error::InvalidInput(format!(
                "confidence must be within [0, 1], got {}",
                input.confidence
            )));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "INSERT INTO annotations (id, entity_kind, entity_id, dimension, category, content, confidence, evidence, extensions, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    id.to_string(),
                    input.entity.kind.as_str(),
                    input.entity.id.to_string(),
                    &input.dimension,
                    &input.category,
                    &input.content,
                    input.confidence,
                    &input.evidence,
                    serde_json::to_string(&input.extensions)?,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ),
            )?;
        }

        self.publish("annotations", ChangeKind::Created, id);

        Ok(KnowledgeAnnotation {
            id,
            entity: input.entity,
            dimension: input.dimension,
            category: input.category,
            content: input.content,
            confidence: input.confidence,
            evidence: input.evidence,
            extensions: input.extensions,
            created_at: now,
            updated_at: now,
        })
    }

    /// Direct overwrite of annotation fields, bypassing the blend formula.
    /// A supplied confidence is clamped to [0, 1].
    pub fn update_annotation(
        &self,
        id: Uuid,
        input: UpdateAnnotationInput,
    ) -> Result<KnowledgeAnnotation> {
        let existing = self
            .get_annotation(id)?
            .ok_or_else(|| Error::not_found("annotation", id))?;

        let now = Utc::now();
        let category = input.category.unwrap_or(existing.category);
        let content = input.content.unwrap_or(existing.content);
        let confidence = input
            .confidence
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(existing.confidence);
        let evidence = input.evidence.or(existing.evidence);
        let extensions = input.extensions.unwrap_or(existing.extensions);

        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "UPDATE annotations SET category = ?, content = ?, confidence = ?, evidence = ?, extensions = ?, updated_at = ? WHERE id = ?",
                (
                    &category,
                    &content,
                    confidence,
                    &evidence,
                    serde_json::to_string(&extensions)?,
                    now.to_rfc3339(),
                    id.to_string(),
                ),
            )?;
        }

        self.publish("annotations", ChangeKind::Updated, id);

        Ok(KnowledgeAnnotation {
            id,
            entity: existing.entity,
            dimension: existing.dimension,
            category,
            content,
            confidence,
            evidence,
            extensions,
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    /// Blend new evidence into an annotation's confidence:
    /// `(confidence * weight + new_evidence) / (weight + 1)`, clamped to
    /// [0, 1]. A linear blend, not a true Bayesian posterior, despite what
    /// the domain calls it.
    pub fn update_annotation_confidence(
        &self,
        id: Uuid,
        new_evidence: f64,
        weight: f64,
    ) -> Result<KnowledgeAnnotation> {
        if weight <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "weight must be > 0, got {weight}"
            )));
        }
        if !(0.0..=1.0).contains(&new_evidence) {
            return Err(Error::InvalidInput(format!(
                "new evidence must be within [0, 1], got {new_evidence}"
            )));
        }

        let existing = self
            .get_annotation(id)?
            .ok_or_else(|| Error::not_found("annotation", id))?;

        let confidence =
            ((existing.confidence * weight + new_evidence) / (weight + 1.0)).clamp(0.0, 1.0);
        let now = Utc::now();

        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "UPDATE annotations SET confidence = ?, updated_at = ? WHERE id = ?",
                (confidence, now.to_rfc3339(), id.to_string()),
            )?;
        }

        self.publish("annotations", ChangeKind::Updated, id);

        Ok(KnowledgeAnnotation {
            confidence,
            updated_at: now,
            ..existing
        })
    }

    pub fn get_annotation(&self, id: Uuid) -> Result<Option<KnowledgeAnnotation>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, entity_kind, entity_id, dimension, category, content, confidence, evidence, extensions, created_at, updated_at
             FROM annotations WHERE id = ?",
        )?;

        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(annotation_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn annotations_for_entity(&self, entity: EntityRef) -> Result<Vec<KnowledgeAnnotation>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, entity_kind, entity_id, dimension, category, content, confidence, evidence, extensions, created_at, updated_at
             FROM annotations WHERE entity_kind = ? AND entity_id = ? ORDER BY created_at",
        )?;

        let annotations = stmt
            .query_map(
                (entity.kind.as_str(), entity.id.to_string()),
                annotation_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(annotations)
    }

    pub fn annotations_by_dimension(&self, dimension: &str) -> Result<Vec<KnowledgeAnnotation>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, entity_kind, entity_id, dimension, category, content, confidence, evidence, extensions, created_at, updated_at
             FROM annotations WHERE dimension = ? ORDER BY created_at",
        )?;

        let annotations = stmt
            .query_map([dimension], annotation_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(annotations)
    }

    pub fn delete_annotation(&self, id: Uuid) -> Result<()> {
        let rows = {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute("DELETE FROM annotations WHERE id = ?", [id.to_string()])?
        };
        if rows == 0 {
            return Err(Error::not_found("annotation", id));
        }
        self.publish("annotations", ChangeKind::Deleted, id);
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            events: self.events.clone(),
        }
    }
}

// ============================================================
// Row mapping
// ============================================================

fn relation_from_row(row: &rusqlite::Row) -> rusqlite::Result<Relation> {
    Ok(Relation {
        id: parse_uuid(row.get::<_, String>(0)?),
        source: parse_entity_ref(row.get(1)?, row.get(2)?),
        target: parse_entity_ref(row.get(3)?, row.get(4)?),
        relation_type: RelationType::from_str(&row.get::<_, String>(5)?)
            .unwrap_or(RelationType::RelatesTo),
        description: row.get(6)?,
        extensions: parse_json(row.get::<_, String>(7)?),
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

fn history_from_row(row: &rusqlite::Row) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: parse_uuid(row.get::<_, String>(0)?),
        entity: parse_entity_ref(row.get(1)?, row.get(2)?),
        action: HistoryAction::from_str(&row.get::<_, String>(3)?)
            .unwrap_or(HistoryAction::Updated),
        actor: row.get(4)?,
        changes: parse_json(row.get::<_, String>(5)?),
        previous_state: row
            .get::<_, Option<String>>(6)?
            .map(|s| serde_json::from_str(&s).unwrap_or(Value::Null)),
        summary: row.get(7)?,
        session_id: row.get::<_, Option<String>>(8)?.map(parse_uuid),
        created_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

fn session_from_row(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    let active_entity = match (
        row.get::<_, Option<String>>(2)?,
        row.get::<_, Option<String>>(3)?,
    ) {
        (Some(kind), Some(id)) => Some(parse_entity_ref(kind, id)),
        _ => None,
    };

    Ok(Session {
        id: parse_uuid(row.get::<_, String>(0)?),
        actor: row.get(1)?,
        active_entity,
        phase: row.get(4)?,
        started_at: parse_datetime(row.get::<_, String>(5)?),
        ended_at: row.get::<_, Option<String>>(6)?.map(parse_datetime),
    })
}

fn annotation_from_row(row: &rusqlite::Row) -> rusqlite::Result<KnowledgeAnnotation> {
    Ok(KnowledgeAnnotation {
        id: parse_uuid(row.get::<_, String>(0)?),
        entity: parse_entity_ref(row.get(1)?, row.get(2)?),
        dimension: row.get(3)?,
        category: row.get(4)?,
        content: row.get(5)?,
        confidence: row.get(6)?,
        evidence: row.get(7)?,
        extensions: parse_json(row.get::<_, String>(8)?),
        created_at: parse_datetime(row.get::<_, String>(9)?),
        updated_at: parse_datetime(row.get::<_, String>(10)?),
    })
}

fn parse_entity_ref(kind: String, id: String) -> EntityRef {
    EntityRef {
        kind: EntityKind::from_str(&kind).unwrap_or(EntityKind::Task),
        id: parse_uuid(id),
    }
}

fn parse_json<T: serde::de::DeserializeOwned + Default>(s: String) -> T {
    serde_json::from_str(&s).unwrap_or_default()
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
