//! Storage backend implementations.
//!
//! This module contains implementations of the `StorageBackend` trait
//! for the supported storage engines, feature-gated for conditional
//! compilation.

#[cfg(feature = "redb")]
pub mod redb;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "redb")]
pub use redb::{RedbBackend, RedbBackendConfig};

#[cfg(feature = "memory")]
pub use memory::MemoryBackend;
