// ================================================================
// File: memequeue-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// A guarded update lost its race inside a transaction. Internal signal:
    /// the queue retry loop re-runs the whole attempt and callers never see it.
    #[error("Queue conflict: {0}")]
    QueueConflict(String),

    /// The operation kept losing races until the retry budget ran out.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Event bus error: {0}")]
    EventBus(String),

    #[error("Uuid error: {0}")]
    Uuid(#[from] uuid::Error),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Parse(e.to_string())
    }
}
