//! Core traits and types for PillBuddy.
//!
//! This crate defines the foundational abstractions shared by the storage,
//! messaging and device-tracking crates.

pub mod config;
pub mod event;
pub mod eventbus;
pub mod storage;

// Configuration exports
pub use config::TrackerConfig;

// Event exports
pub use event::{EventMetadata, TrackerEvent};

// Event bus exports
pub use eventbus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventBusReceiver, SharedEventBus};

/// Re-exports commonly used types.
pub mod prelude {
    // Configuration
    pub use crate::config::{TrackerConfig, env_vars, limits, topics};

    // Event types
    pub use crate::event::{EventMetadata, TrackerEvent};

    // Event bus
    pub use crate::eventbus::{EventBus, SharedEventBus};

    // Storage
    pub use crate::storage::{StorageBackend, StorageError};
}
