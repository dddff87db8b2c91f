//! Storage layer for PillBuddy.
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `redb` | ✅ | Persistent backend on the redb embedded database |
//! | `memory` | ✅ | In-memory backend for tests and ephemeral runs |
//!
//! Holders, per-slot prescriptions and the slot event log live behind
//! [`PillStore`], which is constructed once and handed to every component
//! that needs state.

pub mod backends;
pub mod entities;
pub mod error;
pub mod repository;

pub use entities::{Device, EventRecord, Prescription, Slot, SlotState};
pub use error::{Error, Result};
pub use repository::{CorruptRecord, PillStore, Removal};
