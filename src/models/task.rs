use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The execution status of a task.
///
/// - `Pending`: not yet started
/// - `Running`: an actor is actively working
/// - `Completed`: work finished successfully
/// - `Failed`: task could not be completed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// The task snapshot shape the readiness engine consumes from the external
/// entity store.
///
/// `dependencies` holds ids of tasks that must be `Completed` before this one
/// is considered ready. The ids are not validated on write; a dependency that
/// no longer resolves counts as unmet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// The story this task belongs to, if any.
    pub story_id: Option<Uuid>,
    pub title: String,
    pub status: TaskStatus,
    pub assignee: Option<String>,
    pub dependencies: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}
