//! Pill-count state machine.
//!
//! Each configured slot is either Present or Removed. Lifting the bottle
//! counts a dose and starts the bottle-out timer; putting it back stops the
//! timer and switches the slot light off. Slots without a prescription are
//! left alone.

use std::sync::Arc;

use serde::Serialize;
use pillbuddy_core::{SharedEventBus, TrackerEvent};
use pillbuddy_messages::Notifier;
use pillbuddy_storage::{PillStore, Slot};
use tracing::{info, warn};

use crate::command::{CommandPublisher, LedCommand};
use crate::Result;

/// What a slot event did to the prescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// No prescription for the slot; nothing changed.
    Unconfigured,
    /// Bottle lifted and a dose counted.
    Removed {
        previous_count: u32,
        remaining: u32,
        refill_reminder: bool,
    },
    /// Bottle put back.
    Returned,
}

/// Applies removals and returns to prescriptions.
#[derive(Clone)]
pub struct PillCountMachine {
    store: PillStore,
    notifier: Notifier,
    commands: Arc<dyn CommandPublisher>,
    event_bus: Option<SharedEventBus>,
    refill_threshold: u32,
}

impl PillCountMachine {
    pub fn new(
        store: PillStore,
        notifier: Notifier,
        commands: Arc<dyn CommandPublisher>,
        refill_threshold: u32,
    ) -> Self {
        Self {
            store,
            notifier,
            commands,
            event_bus: None,
            refill_threshold,
        }
    }

    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Apply one presence change.
    ///
    /// Store failures propagate; reminders and the light command are
    /// best-effort.
    pub async fn apply(
        &self,
        device_id: &str,
        slot: Slot,
        in_holder: bool,
        timestamp: i64,
    ) -> Result<Transition> {
        if in_holder {
            self.on_return(device_id, slot, timestamp).await
        } else {
            self.on_removal(device_id, slot, timestamp).await
        }
    }

    async fn on_removal(&self, device_id: &str, slot: Slot, timestamp: i64) -> Result<Transition> {
        let Some(removal) = self.store.record_removal(device_id, slot, timestamp).await? else {
            info!(device_id, slot = %slot, "no prescription configured, removal ignored");
            return Ok(Transition::Unconfigured);
        };

        let prescription = &removal.prescription;
        let remaining = prescription.pill_count;
        info!(
            device_id,
            slot = %slot,
            previous = removal.previous_count,
            remaining,
            "dose counted"
        );

        self.notifier
            .dose_taken(
                device_id,
                slot.number(),
                &prescription.prescription_name,
                removal.previous_count,
            )
            .await;
        self.publish(TrackerEvent::DoseTaken {
            device_id: device_id.to_string(),
            slot: slot.number(),
            remaining,
            timestamp,
        });

        let refill_reminder = remaining < self.refill_threshold;
        if refill_reminder {
            self.notifier
                .refill_needed(
                    device_id,
                    slot.number(),
                    &prescription.prescription_name,
                    remaining,
                    prescription.has_refills,
                )
                .await;
            self.publish(TrackerEvent::RefillNeeded {
                device_id: device_id.to_string(),
                slot: slot.number(),
                remaining,
                has_refills: prescription.has_refills,
            });
        }

        Ok(Transition::Removed {
            previous_count: removal.previous_count,
            remaining,
            refill_reminder,
        })
    }

    async fn on_return(&self, device_id: &str, slot: Slot, timestamp: i64) -> Result<Transition> {
        if self
            .store
            .record_return(device_id, slot, timestamp)
            .await?
            .is_none()
        {
            info!(device_id, slot = %slot, "no prescription configured, return ignored");
            return Ok(Transition::Unconfigured);
        }

        info!(device_id, slot = %slot, "bottle returned");
        if let Err(e) = self
            .commands
            .publish(device_id, LedCommand::turn_off(slot))
            .await
        {
            warn!(device_id, slot = %slot, error = %e, "failed to turn off slot light");
        }
        self.publish(TrackerEvent::BottleReturned {
            device_id: device_id.to_string(),
            slot: slot.number(),
            timestamp,
        });

        Ok(Transition::Returned)
    }

    fn publish(&self, event: TrackerEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}
