//! Domain models for worktrail.
//!
//! # Core Concepts
//!
//! ## Records owned by this crate
//!
//! - [`Relation`]: a typed directed edge between two [`EntityRef`]s. A
//!   bidirectional relation is stored as two independent rows.
//! - [`HistoryEntry`]: an immutable, append-only record of one state
//!   transition on an entity (like `git log` for a work item).
//! - [`Session`]: a bounded unit of work correlating a run of history entries.
//!   At most one session is active at a time.
//! - [`KnowledgeAnnotation`]: a piece of knowledge about an entity carrying a
//!   [0,1] confidence score.
//!
//! ## Snapshots consumed from the entity store
//!
//! - [`EntityRef`]: a (kind, id) reference to an entity the external store
//!   owns.
//! - [`Task`]: the task snapshot shape the readiness engine reads.

mod entity;
mod extensions;
mod history;
mod knowledge;
mod relation;
mod session;
mod task;

pub use entity::*;
pub use extensions::*;
pub use history::*;
pub use knowledge::*;
pub use relation::*;
pub use session::*;
pub use task::*;
