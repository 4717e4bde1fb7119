//! Worktrail tracks hierarchical work items (features → stories → tasks) for
//! collaborating human and agent actors.
//!
//! Entity CRUD itself lives in an external entity store, consumed through the
//! [`store::EntityStore`] trait. On top of that contract this crate layers:
//!
//! - a typed relationship graph between entities ([`db::Database`] relation
//!   operations, [`models::RelationType`]),
//! - an append-only audit trail with field-level diffs ([`audit`],
//!   [`models::HistoryEntry`]),
//! - confidence-weighted knowledge annotations
//!   ([`models::KnowledgeAnnotation`]),
//! - session lifecycle management ([`models::Session`]),
//! - a dependency readiness engine ([`readiness`]),
//! - an in-process change-event channel ([`events::EventBus`]).
//!
//! All operations are synchronous bounded local calls; the database serializes
//! in-process access behind a mutex and relies on SQLite's WAL journaling for
//! anything sharing the file.

pub mod audit;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod readiness;
pub mod store;

pub use error::{Error, Result};
