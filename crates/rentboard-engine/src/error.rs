//! Error taxonomy for engine operations.

use thiserror::Error;

use crate::storage::StorageError;

/// Result type alias using `EngineError`.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the engine's services.
///
/// `Store` is the transient class: a tick that hits it is logged and retried
/// at the next interval, never mid-tick. Everything else surfaces to the
/// acting caller immediately.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input rejected before persistence.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Illegal state-machine transition.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Ownership or role mismatch.
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Lost an optimistic-update race; re-read and decide, do not blind-retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transient storage failure (timeout, connection, query).
    #[error("Storage error: {0}")]
    Store(StorageError),
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => Self::NotFound(what),
            other => Self::Store(other),
        }
    }
}
