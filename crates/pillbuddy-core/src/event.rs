//! Events raised by the pill tracker.
//!
//! These are published on the [`EventBus`](crate::EventBus) after state has
//! been persisted, so observers never see an event for a write that failed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something the tracker did that observers may care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// A bottle left its slot and the count was decremented.
    DoseTaken {
        device_id: String,
        slot: u8,
        remaining: u32,
        timestamp: i64,
    },
    /// Remaining pills dropped below the refill threshold.
    RefillNeeded {
        device_id: String,
        slot: u8,
        remaining: u32,
        has_refills: bool,
    },
    /// A bottle came back to its slot.
    BottleReturned {
        device_id: String,
        slot: u8,
        timestamp: i64,
    },
    /// A bottle has been out longer than the timeout threshold.
    ReturnReminder {
        device_id: String,
        slot: u8,
        elapsed_ms: i64,
    },
    /// An event was skipped by the sequence watermark.
    DuplicateSkipped {
        device_id: String,
        sequence: i64,
    },
}

impl TrackerEvent {
    /// Device the event concerns.
    pub fn device_id(&self) -> &str {
        match self {
            Self::DoseTaken { device_id, .. }
            | Self::RefillNeeded { device_id, .. }
            | Self::BottleReturned { device_id, .. }
            | Self::ReturnReminder { device_id, .. }
            | Self::DuplicateSkipped { device_id, .. } => device_id,
        }
    }

    /// Short type name, matching the serialized tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::DoseTaken { .. } => "dose_taken",
            Self::RefillNeeded { .. } => "refill_needed",
            Self::BottleReturned { .. } => "bottle_returned",
            Self::ReturnReminder { .. } => "return_reminder",
            Self::DuplicateSkipped { .. } => "duplicate_skipped",
        }
    }
}

/// Metadata attached to every published event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: String,
    pub source: String,
    /// Publish time (unix millis).
    pub timestamp: i64,
}

impl EventMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            source: source.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
