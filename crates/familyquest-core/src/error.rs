//! Core error types for familyquest-core.

use thiserror::Error;
use uuid::Uuid;

/// Core error type for engine operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Backing-store failures; retryable from the caller's side.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Habit not found: {0}")]
    HabitNotFound(Uuid),

    #[error("Member not found: {0}")]
    MemberNotFound(Uuid),

    #[error("Quest not found: {0}")]
    QuestNotFound(Uuid),

    #[error("Habit {0} is not active")]
    HabitInactive(Uuid),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Store-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Store is locked or a lock was poisoned
    #[error("Store is locked")]
    Locked,

    /// Per-day uniqueness backstop fired on insert
    #[error("Completion already logged for {date}")]
    DuplicateLog { date: chrono::NaiveDate },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
