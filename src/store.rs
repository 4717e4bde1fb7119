//! The external entity store contract.
//!
//! Feature/story/task records live in a collaborator outside this crate.
//! [`EntityStore`] is the read side this crate consumes: full current-state
//! snapshots suitable for diffing and readiness checks.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::models::Task;
use crate::Result;

/// Read contract the external entity store provides.
///
/// Implementations return complete snapshots of current state; the readiness
/// engine never caches them across calls.
pub trait EntityStore {
    fn find_task(&self, id: Uuid) -> Result<Option<Task>>;

    fn all_tasks(&self) -> Result<Vec<Task>>;

    fn tasks_by_story(&self, story_id: Uuid) -> Result<Vec<Task>> {
        Ok(self
            .all_tasks()?
            .into_iter()
            .filter(|t| t.story_id == Some(story_id))
            .collect())
    }
}

/// In-memory [`EntityStore`] for tests and embedders that keep entities in
/// process.
#[derive(Default)]
pub struct MemoryEntityStore {
    tasks: Mutex<HashMap<Uuid, Task>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task snapshot.
    pub fn put_task(&self, task: Task) {
        self.tasks
            .lock()
            .expect("entity store lock poisoned")
            .insert(task.id, task);
    }

    pub fn remove_task(&self, id: Uuid) -> Option<Task> {
        self.tasks
            .lock()
            .expect("entity store lock poisoned")
            .remove(&id)
    }
}

impl EntityStore for MemoryEntityStore {
    fn find_task(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(self
            .tasks
            .lock()
            .expect("entity store lock poisoned")
            .get(&id)
            .cloned())
    }

    fn all_tasks(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .lock()
            .expect("entity store lock poisoned")
            .values()
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }
}
