//! Holder setup and status.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pillbuddy_storage::{Device, PillStore, Prescription, Slot};

use crate::command::{CommandPublisher, LedCommand};
use crate::slots::validate_slot;
use crate::{Result, TrackerError};

/// One slot as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    pub slot_number: u8,
    pub prescription_name: Option<String>,
    pub pill_count: u32,
    pub in_holder: bool,
}

/// Combined view of a holder's slots and prescriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderStatus {
    pub device_id: String,
    pub slots: Vec<SlotStatus>,
}

impl HolderStatus {
    /// Spoken summary of the configured slots.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .slots
            .iter()
            .filter_map(|s| {
                let name = s.prescription_name.as_deref()?;
                let noun = if s.pill_count == 1 { "pill" } else { "pills" };
                Some(format!(
                    "Slot {} has {} with {} {} remaining",
                    s.slot_number, name, s.pill_count, noun
                ))
            })
            .collect();

        match parts.as_slice() {
            [] => "You don't have any prescriptions set up yet.".to_string(),
            [only] => format!("{}.", only),
            [init @ .., last] => format!("{}, and {}.", init.join(", "), last),
        }
    }
}

/// Registers holders and configures their slots.
#[derive(Clone)]
pub struct SetupService {
    store: PillStore,
    commands: Arc<dyn CommandPublisher>,
}

impl SetupService {
    pub fn new(store: PillStore, commands: Arc<dyn CommandPublisher>) -> Self {
        Self { store, commands }
    }

    /// Return the holder, creating it with three empty slots if new.
    pub async fn ensure_device(&self, device_id: &str, now: i64) -> Result<Device> {
        if device_id.trim().is_empty() {
            return Err(TrackerError::validation("device_id required"));
        }
        Ok(self.store.ensure_device(device_id, now).await?)
    }

    /// Store a prescription for a slot and light the slot up.
    ///
    /// Replaces whatever was configured there before.
    pub async fn configure_slot(
        &self,
        device_id: &str,
        slot: i64,
        prescription_name: &str,
        pill_count: i64,
        has_refills: bool,
        now: i64,
    ) -> Result<Prescription> {
        let slot: Slot = validate_slot(slot)?;
        let name = prescription_name.trim();
        if name.is_empty() {
            return Err(TrackerError::validation("prescription name required"));
        }
        let pill_count = u32::try_from(pill_count)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                TrackerError::validation(format!(
                    "pill count must be a positive number, got {}",
                    pill_count
                ))
            })?;

        self.ensure_device(device_id, now).await?;
        let prescription = Prescription::new(device_id, slot, name, pill_count, has_refills, now);
        self.store.put_prescription(&prescription).await?;
        info!(device_id, slot = %slot, name, pill_count, has_refills, "slot configured");

        if let Err(e) = self
            .commands
            .publish(device_id, LedCommand::turn_on(slot))
            .await
        {
            warn!(device_id, slot = %slot, error = %e, "failed to turn on slot light");
        }

        Ok(prescription)
    }

    /// Three-slot view, whether or not the holder has been seen.
    pub async fn status(&self, device_id: &str) -> Result<HolderStatus> {
        let device = self.store.get_device(device_id).await?;
        let prescriptions = self.store.query_prescriptions(device_id).await?;

        let slots = Slot::ALL
            .iter()
            .map(|&slot| {
                let prescription = prescriptions.iter().find(|p| p.slot == slot);
                SlotStatus {
                    slot_number: slot.number(),
                    prescription_name: prescription.map(|p| p.prescription_name.clone()),
                    pill_count: prescription.map_or(0, |p| p.pill_count),
                    in_holder: device.as_ref().is_some_and(|d| d.slot(slot).in_holder),
                }
            })
            .collect();

        Ok(HolderStatus {
            device_id: device_id.to_string(),
            slots,
        })
    }
}
