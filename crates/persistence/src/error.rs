//! Persistence layer error types.

use thiserror::Error;

/// Errors surfaced by the document-store repositories.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored document is malformed: {0}")]
    MalformedDocument(#[from] serde_json::Error),
}
