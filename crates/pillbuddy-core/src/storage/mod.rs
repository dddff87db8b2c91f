//! Core storage abstractions for PillBuddy.
//!
//! This module defines the foundational trait for storage backends.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage error types.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key not found.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Backend error.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Update closure rejected the current value.
    #[error("Update rejected: {0}")]
    Rejected(String),

    /// Other error.
    #[error("Storage error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Closure used by [`StorageBackend::update`].
///
/// Receives the current value (if any). Returning `Some(bytes)` stores the
/// bytes; returning `None` leaves the key untouched.
pub type UpdateFn<'a> = dyn FnMut(Option<&[u8]>) -> Result<Option<Vec<u8>>> + 'a;

/// Core storage backend trait.
///
/// Implemented by the redb and in-memory backends. Keys are namespaced by
/// table; `scan` matches on key prefix within one table.
pub trait StorageBackend: Send + Sync {
    /// Write a value to a key in the specified table.
    fn write(&self, table: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Read a value by key from the specified table.
    fn read(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a key from the specified table.
    fn delete(&self, table: &str, key: &str) -> Result<bool>;

    /// Scan keys with a given prefix in the specified table.
    fn scan(&self, table: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Atomically read-modify-write a single key.
    ///
    /// No other write to the backend interleaves between the read handed to
    /// `f` and the write of its result. Returns the value stored under the key
    /// once the update finished.
    fn update(&self, table: &str, key: &str, f: &mut UpdateFn<'_>) -> Result<Option<Vec<u8>>>;

    /// Check if this backend supports persistent storage.
    fn is_persistent(&self) -> bool;
}
