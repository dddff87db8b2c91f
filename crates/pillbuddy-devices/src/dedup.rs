//! Per-device sequence watermark.
//!
//! A holder numbers its events; anything at or below the highest number
//! already applied is a redelivery. Sequence `0` (and below) means the
//! firmware did not number the event, so it always applies.

use pillbuddy_storage::PillStore;
use tracing::{debug, warn};

use crate::Result;

/// Whether an event should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply,
    /// Already applied; `watermark` is the stored `last_sequence`.
    Skip { watermark: i64 },
}

impl Decision {
    pub fn should_apply(&self) -> bool {
        matches!(self, Self::Apply)
    }
}

/// Watermark check and advance against the store.
#[derive(Clone)]
pub struct Deduplicator {
    store: PillStore,
}

impl Deduplicator {
    pub fn new(store: PillStore) -> Self {
        Self { store }
    }

    /// Decide whether `sequence` from `device_id` is new.
    ///
    /// A failed read applies the event: a double count is preferred over a
    /// lost one.
    pub async fn accept(&self, device_id: &str, sequence: i64) -> Decision {
        if sequence <= 0 {
            return Decision::Apply;
        }

        match self.store.get_device(device_id).await {
            Ok(device) => {
                let watermark = device.map_or(-1, |d| d.last_sequence);
                if sequence <= watermark {
                    debug!(device_id, sequence, watermark, "duplicate event");
                    Decision::Skip { watermark }
                } else {
                    Decision::Apply
                }
            }
            Err(e) => {
                warn!(device_id, sequence, error = %e, "watermark read failed, applying event");
                Decision::Apply
            }
        }
    }

    /// Record that `sequence` was fully applied.
    ///
    /// Returns the watermark after the update, or `None` for unsequenced
    /// events. The stored value only ever rises.
    pub async fn commit(&self, device_id: &str, sequence: i64, now: i64) -> Result<Option<i64>> {
        if sequence <= 0 {
            return Ok(None);
        }
        let watermark = self.store.advance_sequence(device_id, sequence, now).await?;
        Ok(Some(watermark))
    }
}
