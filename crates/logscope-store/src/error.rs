//! Error types for the store and its views.

use thiserror::Error;

/// Errors reported to callers of the store, registry and views.
///
/// Broken internal invariants are not represented here; those panic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A lookup named an id or key that is not registered.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A position or view index is past the current bounds.
    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    /// An operation was attempted on an entity that cannot undergo it.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// A construction parameter was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn out_of_range(index: usize, len: usize) -> Self {
        Self::OutOfRange { index, len }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::not_found("process", "process#7");
        assert_eq!(err.to_string(), "process not found: process#7");

        let err = StoreError::out_of_range(10, 3);
        assert_eq!(err.to_string(), "index 10 out of range (len 3)");

        let err = StoreError::InvalidTransition("view#4 does not exist".to_string());
        assert_eq!(err.to_string(), "invalid transition: view#4 does not exist");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
    }
}
