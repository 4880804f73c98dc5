//! Engine error types.

use engage_core::{EngageError, InteractionKind};
use engage_store::StoreError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The fast store could not be reached; the operation did not happen.
    #[error("fast store unavailable: {0}")]
    StoreUnavailable(String),

    /// A flush could not write to the durable store after every retry.
    ///
    /// Never returned to request callers: flushes run in the background and
    /// re-queue their entries.
    #[error("durable write for {kind} failed after {attempts} attempts: {message}")]
    DurablePersistFailed {
        /// The interaction kind being flushed.
        kind: InteractionKind,
        /// Attempts made.
        attempts: u32,
        /// Last error from the durable store.
        message: String,
    },

    /// A durable read failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Unknown interaction kind.
    #[error("invalid interaction kind: {0}")]
    InvalidKind(String),

    /// Malformed input such as an impossible date.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Wrap a fast-store failure.
    pub(crate) fn unavailable(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<EngageError> for EngineError {
    fn from(err: EngageError) -> Self {
        match err {
            EngageError::InvalidKind(kind) => Self::InvalidKind(kind),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}
