//! Pill tracking for PillBuddy holders.
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `mqtt` | ✅ | MQTT ingestion loop and command publisher |
//!
//! ## Architecture
//!
//! Holder events flow through one pipeline, driven by [`EventProcessor`]:
//!
//! - **Ingress** ([`ingress`]): raw or enriched envelopes into a
//!   [`CanonicalEvent`]
//! - **Deduplicator** ([`dedup`]): per-device sequence watermark
//! - **Slot state** ([`slots`]): presence and `last_seen`
//! - **Pill count** ([`pill_machine`]): dose counting, refill and return
//!   reminders, slot lights
//!
//! The [`TimeoutScanner`] runs on its own schedule and reminds users about
//! bottles left out. [`SetupService`] configures slots and reports status.
//! All state lives in the [`PillStore`](pillbuddy_storage::PillStore)
//! handed to each component.

pub mod command;
pub mod dedup;
pub mod error;
pub mod ingress;
pub mod pill_machine;
pub mod processor;
pub mod scanner;
pub mod setup;
pub mod slots;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use command::{CommandPublisher, LedAction, LedCommand, MemoryCommandPublisher};
pub use dedup::{Decision, Deduplicator};
pub use error::{Result, TrackerError};
pub use ingress::{CanonicalEvent, EventKind, RawEnvelope};
pub use pill_machine::{PillCountMachine, Transition};
pub use processor::{EventProcessor, ProcessOutcome};
pub use scanner::{ScanAction, ScanReport, ScanResult, TimeoutScanner};
pub use setup::{HolderStatus, SetupService, SlotStatus};
pub use slots::{validate_slot, SlotStateUpdater};

#[cfg(feature = "mqtt")]
pub use command::MqttCommandPublisher;
#[cfg(feature = "mqtt")]
pub use mqtt::{connect, run_ingest, MqttConfig};
