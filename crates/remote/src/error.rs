//! Remote backend error types.

use thiserror::Error;

/// Remote worker backend operation errors.
///
/// These surface only to the garbage collector, which logs and defers to
/// the next cycle; none of them is fatal to the process.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connect failure or timeout. The worker may be gone, partitioned,
    /// or just slow; retried on a later cycle.
    #[error("worker unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with a non-success status.
    #[error("remote call failed with status {status}: {detail}")]
    Remote { status: u16, detail: String },

    #[error("invalid worker address: {0}")]
    InvalidAddress(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
