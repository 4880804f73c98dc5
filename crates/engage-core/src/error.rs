//! Error types for engage core types.

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, EngageError>;

/// Errors that can occur while parsing or validating core types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngageError {
    /// Interaction kind is not one of the known kinds.
    #[error("invalid interaction kind: {0}")]
    InvalidKind(String),

    /// A pending-hash field could not be parsed as `subject:actor`.
    #[error("invalid interaction key: {0}")]
    InvalidInteractionKey(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Day of month outside `1..=31`.
    #[error("invalid day of month: {0}")]
    InvalidDay(u32),
}
