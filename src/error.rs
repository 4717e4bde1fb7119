use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy shared by every component.
///
/// Components perform no retries and no silent recovery; every failure is
/// returned to the immediate caller, which owns presentation or further
/// handling.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced id does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// A value failed validation (bad enum value, out-of-range confidence or
    /// weight).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A uniqueness constraint was violated at the storage layer.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A session was started while another one is still active.
    #[error("session {0} is already active")]
    SessionAlreadyActive(Uuid),

    /// A lifecycle operation was applied in the wrong state, e.g. ending a
    /// session when none is active.
    #[error("invalid state: {0}")]
    State(String),

    #[error("storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(err.to_string())
            }
            _ => Self::Storage(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
