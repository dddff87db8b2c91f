//! Slot presence updates.

use pillbuddy_storage::{Device, PillStore, Slot};
use tracing::debug;

use crate::ingress::CanonicalEvent;
use crate::{Result, TrackerError};

/// Validate a raw slot number.
pub fn validate_slot(slot: i64) -> Result<Slot> {
    Slot::from_i64(slot).ok_or_else(|| {
        TrackerError::validation(format!("Invalid slot number: {}", slot))
    })
}

/// Applies slot events to the holder record.
#[derive(Clone)]
pub struct SlotStateUpdater {
    store: PillStore,
}

impl SlotStateUpdater {
    pub fn new(store: PillStore) -> Self {
        Self { store }
    }

    /// Set the slot's presence and the holder's `last_seen`.
    ///
    /// The slot is validated before anything is written. Creates the holder
    /// on first contact. Does not look at prescriptions.
    pub async fn apply(&self, event: &CanonicalEvent) -> Result<Device> {
        let slot = validate_slot(event.slot)?;
        let device = self
            .store
            .update_slot(&event.device_id, slot, event.in_holder, event.timestamp)
            .await?;
        debug!(
            device_id = %event.device_id,
            slot = %slot,
            in_holder = event.in_holder,
            "slot state updated"
        );
        Ok(device)
    }
}
