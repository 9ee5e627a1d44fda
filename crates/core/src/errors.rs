//! Error types for the core crate.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a local record store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage I/O failure
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized or deserialized
    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store is not reachable at all
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Invariant violation inside the store implementation
    #[error("{0}")]
    Internal(String),
}

impl StoreError {
    /// Create an unavailable-store error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create an internal store error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Errors raised by core services.
#[derive(Debug, Error)]
pub enum Error {
    /// Local record store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_wraps_into_core_error() {
        let err: Error = StoreError::unavailable("record store offline").into();
        assert!(matches!(err, Error::Store(StoreError::Unavailable(_))));
        assert_eq!(
            err.to_string(),
            "store error: store unavailable: record store offline"
        );
    }
}
