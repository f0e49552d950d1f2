//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A foreign-key target (worker, resource config, resource cache, build)
    /// vanished between resolution and insert. The caller re-resolves its
    /// inputs and retries the whole operation.
    #[error("stale reference: {0}")]
    ReferenceStale(String),

    /// A conditional state transition matched zero rows: another actor
    /// already advanced or removed the row. Benign for idempotent callers.
    #[error("state conflict: {resource} {id} is no longer '{expected}'")]
    StateConflict {
        resource: &'static str,
        id: i64,
        expected: &'static str,
    },

    /// A uniqueness violation. Drives the find-or-create retry protocol.
    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    /// True when another actor already advanced or removed the row.
    pub fn is_state_conflict(&self) -> bool {
        matches!(self, Self::StateConflict { .. })
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
