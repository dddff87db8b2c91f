//! Event processing pipeline.
//!
//! ingress -> slot validation -> dedup -> event log -> slot state ->
//! pill count -> watermark.
//!
//! The watermark is advanced only after every state-mutating step has
//! succeeded, so a failed event is retried on redelivery rather than
//! skipped. Events for one device hold that device's lock from the
//! watermark check to the watermark advance, so two deliveries of the same
//! sequence can never both pass the check.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use pillbuddy_core::{SharedEventBus, TrackerConfig, TrackerEvent};
use pillbuddy_messages::Notifier;
use pillbuddy_storage::{EventRecord, PillStore, Slot};

use crate::command::CommandPublisher;
use crate::dedup::{Decision, Deduplicator};
use crate::ingress::{CanonicalEvent, RawEnvelope};
use crate::pill_machine::{PillCountMachine, Transition};
use crate::slots::{validate_slot, SlotStateUpdater};
use crate::{Result, TrackerError};

/// How an event was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// State was updated.
    Applied {
        device_id: String,
        slot: u8,
        transition: Transition,
        /// Watermark after this event; `None` for unsequenced events.
        watermark: Option<i64>,
    },
    /// Redelivery of an already-applied sequence.
    Duplicate {
        device_id: String,
        sequence: i64,
        watermark: i64,
    },
    /// Input was invalid; nothing was written and a retry will not help.
    Rejected { reason: String },
}

/// One async lock per holder.
#[derive(Default)]
struct DeviceLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DeviceLocks {
    fn get(&self, device_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(device_id.to_string())
            .or_default()
            .clone()
    }
}

/// Wires the tracker components together for one store.
///
/// Clones share the per-device locks, so every clone handed to a transport
/// worker serializes against the others.
#[derive(Clone)]
pub struct EventProcessor {
    store: PillStore,
    locks: Arc<DeviceLocks>,
    dedup: Deduplicator,
    slots: SlotStateUpdater,
    pills: PillCountMachine,
    event_bus: Option<SharedEventBus>,
    config: TrackerConfig,
}

impl EventProcessor {
    pub fn new(
        store: PillStore,
        notifier: Notifier,
        commands: Arc<dyn CommandPublisher>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            dedup: Deduplicator::new(store.clone()),
            slots: SlotStateUpdater::new(store.clone()),
            pills: PillCountMachine::new(
                store.clone(),
                notifier,
                commands,
                config.refill_threshold,
            ),
            store,
            locks: Arc::new(DeviceLocks::default()),
            event_bus: None,
            config,
        }
    }

    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.pills = self.pills.with_event_bus(event_bus.clone());
        self.event_bus = Some(event_bus);
        self
    }

    pub fn store(&self) -> &PillStore {
        &self.store
    }

    /// Handle a transport payload.
    ///
    /// Validation failures become [`ProcessOutcome::Rejected`]; only store
    /// failures come back as `Err`, which the transport should treat as
    /// "redeliver".
    pub async fn handle_payload(
        &self,
        payload: &[u8],
        topic_device: Option<&str>,
        now: i64,
    ) -> Result<ProcessOutcome> {
        let parsed = RawEnvelope::from_slice(payload)
            .map(|raw| raw.with_fallback_device(topic_device))
            .and_then(|raw| CanonicalEvent::from_envelope(raw, now));
        let outcome = match parsed {
            Ok(event) => self.process(event, now).await,
            Err(e) => Err(e),
        };
        match outcome {
            Err(TrackerError::Validation(reason)) => {
                warn!(device_id = ?topic_device, %reason, "event rejected");
                Ok(ProcessOutcome::Rejected { reason })
            }
            other => other,
        }
    }

    /// Apply one canonical event.
    pub async fn process(&self, event: CanonicalEvent, now: i64) -> Result<ProcessOutcome> {
        let slot = validate_slot(event.slot)?;
        let device_id = event.device_id.clone();

        let lock = self.locks.get(&device_id);
        let _guard = lock.lock().await;

        if let Decision::Skip { watermark } = self.dedup.accept(&device_id, event.sequence).await {
            info!(device_id = %device_id, sequence = event.sequence, watermark, "duplicate event skipped");
            self.publish(TrackerEvent::DuplicateSkipped {
                device_id: device_id.clone(),
                sequence: event.sequence,
            });
            return Ok(ProcessOutcome::Duplicate {
                device_id,
                sequence: event.sequence,
                watermark,
            });
        }

        self.log_event(&event, slot).await;
        self.slots.apply(&event).await?;
        let transition = self
            .pills
            .apply(&device_id, slot, event.in_holder, event.timestamp)
            .await?;
        let watermark = self.dedup.commit(&device_id, event.sequence, now).await?;

        debug!(device_id = %device_id, slot = %slot, ?transition, ?watermark, "event applied");
        Ok(ProcessOutcome::Applied {
            device_id,
            slot: slot.number(),
            transition,
            watermark,
        })
    }

    async fn log_event(&self, event: &CanonicalEvent, slot: Slot) {
        let record = EventRecord {
            device_id: event.device_id.clone(),
            timestamp: event.timestamp,
            event_type: event.kind.as_str().to_string(),
            slot: slot.number(),
            state: event.state.clone(),
            in_holder: event.in_holder,
            sensor_level: event.sensor_level,
            sequence: event.sequence,
            ttl: self.config.event_ttl_secs(event.timestamp),
        };
        if let Err(e) = self.store.append_event(&record).await {
            warn!(device_id = %event.device_id, error = %e, "failed to log event");
        }
    }

    fn publish(&self, event: TrackerEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}
