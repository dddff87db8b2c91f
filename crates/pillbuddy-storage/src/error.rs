//! Error types for the storage crate.

use std::time::Duration;

use thiserror::Error;

pub use pillbuddy_core::storage::StorageError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage error types.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage/Database error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A store call did not finish in time.
    #[error("Store call '{operation}' timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Not found error.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Transient failure of the backing store, worth retrying on redelivery.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Storage(_) | Error::Timeout { .. })
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Io(e) => Error::Io(e),
            StorageError::Serialization(s) => Error::Serialization(s),
            StorageError::KeyNotFound(s) => Error::NotFound(s),
            StorageError::Configuration(s) => Error::InvalidInput(s),
            StorageError::Rejected(s) => Error::InvalidInput(s),
            StorageError::Backend(s) => Error::Storage(s),
            StorageError::Other(e) => Error::Storage(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Storage(format!("Task join error: {}", e))
    }
}
