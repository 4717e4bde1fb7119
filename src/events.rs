//! In-process change notifications.
//!
//! The database publishes a [`ChangeEvent`] after each committed mutation so
//! reactive layers (TUI views, automation hooks) can refresh. Dispatch is
//! synchronous: `publish` invokes every handler registered at publish time,
//! in subscription order, on the caller's own stack, before returning. There
//! is no persistence, retry, or replay; a handler that panics propagates but
//! the preceding write stays committed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::trace;
use uuid::Uuid;

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Notification published after a committed mutation.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// The record set that changed: "relations", "history", "sessions", or
    /// "annotations".
    pub table: &'static str,
    pub kind: ChangeKind,
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: &'static str, kind: ChangeKind, id: Uuid) -> Self {
        Self {
            table,
            kind,
            id,
            timestamp: Utc::now(),
        }
    }
}

/// Handle returned from [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Synchronous in-process pub/sub for [`ChangeEvent`]s.
///
/// Handlers are snapshotted before dispatch, so a handler may subscribe or
/// unsubscribe reentrantly without deadlocking; such changes take effect from
/// the next publish.
pub struct EventBus {
    handlers: Mutex<Vec<(SubscriptionId, Handler)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler; it will be invoked for every subsequent publish
    /// until unsubscribed.
    pub fn subscribe(
        &self,
        handler: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .expect("event bus lock poisoned")
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if the id was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().expect("event bus lock poisoned");
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        handlers.len() != before
    }

    /// Deliver `event` to every currently-registered handler, in
    /// subscription order, on the caller's stack.
    pub fn publish(&self, event: &ChangeEvent) {
        trace!(table = event.table, kind = ?event.kind, id = %event.id, "publishing change event");
        let snapshot: Vec<Handler> = self
            .handlers
            .lock()
            .expect("event bus lock poisoned")
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in snapshot {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().expect("event bus lock poisoned").len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
