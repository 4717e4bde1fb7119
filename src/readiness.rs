//! Dependency readiness: which pending tasks are unblocked.
//!
//! Readiness is always computed fresh from current entity-store snapshots;
//! nothing is cached across calls, so results track the store exactly.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::{Task, TaskStatus};
use crate::store::EntityStore;
use crate::Result;

/// Whether `task` is unblocked: pending, with every dependency completed.
///
/// A dependency id that does not resolve in the store counts as unmet, so an
/// unknown or deleted dependency blocks readiness rather than waving the task
/// through.
pub fn is_ready<S>(task: &Task, store: &S) -> Result<bool>
where
    S: EntityStore + ?Sized,
{
    if task.status != TaskStatus::Pending {
        return Ok(false);
    }
    for dep_id in &task.dependencies {
        match store.find_task(*dep_id)? {
            Some(dep) if dep.status == TaskStatus::Completed => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// All ready tasks, optionally scoped to one story.
///
/// Non-pending tasks are excluded regardless of their dependency state. The
/// completed-id set is collected once per call so each dependency check is a
/// set lookup instead of a store round trip.
pub fn list_ready<S>(store: &S, story: Option<Uuid>) -> Result<Vec<Task>>
where
    S: EntityStore + ?Sized,
{
    let candidates = match story {
        Some(story_id) => store.tasks_by_story(story_id)?,
        None => store.all_tasks()?,
    };

    let completed: HashSet<Uuid> = store
        .all_tasks()?
        .into_iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .map(|t| t.id)
        .collect();

    Ok(candidates
        .into_iter()
        .filter(|task| {
            task.status == TaskStatus::Pending
                && task.dependencies.iter().all(|dep| completed.contains(dep))
        })
        .collect())
}
