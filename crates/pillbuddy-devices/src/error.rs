//! Tracker error type.

use thiserror::Error;

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors surfaced by event processing, setup and the scanner.
///
/// `Validation` is final: the event is rejected and nothing was written.
/// `StoreUnavailable` means a state-mutating step did not complete; the
/// transport should redeliver.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Malformed or out-of-range input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The store failed or did not answer in time.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] pillbuddy_storage::Error),

    /// An indicator-light command could not be sent.
    #[error("Command error: {0}")]
    Command(String),

    /// The message transport failed.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl TrackerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether redelivering the same input could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}
