//! Error types for store operations.
//!
//! Search is deliberately forgiving: missing embeddings, empty candidate
//! sets, dangling relation targets, and zero-vector queries all surface as
//! empty or reduced results, never as errors. The variants here cover the
//! cases that genuinely must reach the caller.

use std::io;

/// Errors raised by store, index, and search operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A request parameter was invalid: empty query vector, dimension
    /// mismatch, or a malformed entry.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced resource does not exist (e.g. an import path or entry id).
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying document store failed. The store handle remains usable.
    #[error("storage failure: {0}")]
    StoreFailure(#[from] io::Error),

    /// Persisted data failed integrity or structural validation.
    #[error("corrupted data: {0}")]
    Corrupted(String),

    /// The caller's cancellation token fired mid-search. No partial results
    /// are returned and no counters are updated.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = StoreError::InvalidArgument("query vector is empty".into());
        assert_eq!(e.to_string(), "invalid argument: query vector is empty");
        let e = StoreError::NotFound("/tmp/missing.json".into());
        assert!(e.to_string().contains("missing.json"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let e: StoreError = io_err.into();
        assert!(matches!(e, StoreError::StoreFailure(_)));
    }
}
