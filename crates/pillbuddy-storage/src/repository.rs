//! Repository over a [`StorageBackend`] for devices, prescriptions and the
//! event log.
//!
//! Every call runs on the blocking pool and is bounded by a timeout. The
//! mutating operations the tracker relies on (`update_slot`,
//! `advance_sequence`, `record_removal`, `record_return`) are single atomic
//! read-modify-writes against the backend.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use pillbuddy_core::config::limits::STORE_TIMEOUT_MS;
use pillbuddy_core::storage::{StorageBackend, StorageError};

use crate::entities::{Device, EventRecord, Prescription, Slot};
use crate::{Error, Result};

const DEVICES: &str = "devices";
const PRESCRIPTIONS: &str = "prescriptions";
const EVENTS: &str = "events";

fn encode<T: Serialize>(value: &T) -> std::result::Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn prescription_key(device_id: &str, slot: Slot) -> String {
    format!("{}#{}", device_id, slot.number())
}

fn event_key(device_id: &str, timestamp: i64) -> String {
    // Zero-padded so keys sort by time within a device.
    format!("{}#{:020}", device_id, timestamp)
}

/// Result of decrementing a prescription on bottle removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// Count before this removal.
    pub previous_count: u32,
    /// Prescription as stored after the update.
    pub prescription: Prescription,
}

/// A stored prescription that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptRecord {
    /// Key as stored, `"{device_id}#{slot}"`.
    pub key: String,
    pub error: String,
}

impl CorruptRecord {
    /// Device id and slot number recovered from the key.
    pub fn location(&self) -> Option<(&str, u8)> {
        let (device_id, slot) = self.key.rsplit_once('#')?;
        Some((device_id, slot.parse().ok()?))
    }
}

/// Typed, timeout-bounded access to tracker state.
#[derive(Clone)]
pub struct PillStore {
    backend: Arc<dyn StorageBackend>,
    timeout: Duration,
}

impl PillStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            timeout: Duration::from_millis(STORE_TIMEOUT_MS),
        }
    }

    /// Store backed by the in-memory backend.
    #[cfg(feature = "memory")]
    pub fn memory() -> Self {
        Self::new(Arc::new(crate::backends::MemoryBackend::new()))
    }

    /// Store backed by a redb file at `path`.
    #[cfg(feature = "redb")]
    pub fn open_redb<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Arc::new(crate::backends::RedbBackend::open(path)?)))
    }

    /// Bound every store call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn is_persistent(&self) -> bool {
        self.backend.is_persistent()
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn StorageBackend) -> std::result::Result<T, StorageError> + Send + 'static,
    {
        let backend = self.backend.clone();
        let task = tokio::task::spawn_blocking(move || f(backend.as_ref()));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => Ok(joined??),
            Err(_) => Err(Error::Timeout {
                operation,
                after: self.timeout,
            }),
        }
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Option<Device>> {
        let key = device_id.to_string();
        self.run("get_device", move |backend| {
            backend.read(DEVICES, &key)?.map(|b| decode(&b)).transpose()
        })
        .await
    }

    pub async fn put_device(&self, device: &Device) -> Result<()> {
        let key = device.device_id.clone();
        let bytes = encode(device)?;
        self.run("put_device", move |backend| backend.write(DEVICES, &key, &bytes))
            .await
    }

    /// Return the device, creating it with empty slots if absent.
    pub async fn ensure_device(&self, device_id: &str, now: i64) -> Result<Device> {
        let key = device_id.to_string();
        self.run("ensure_device", move |backend| {
            let stored = backend.update(DEVICES, &key, &mut |current: Option<&[u8]>| {
                match current {
                    Some(_) => Ok(None),
                    None => Ok(Some(encode(&Device::new(key.clone(), now))?)),
                }
            })?;
            match stored {
                Some(bytes) => decode(&bytes),
                None => Err(StorageError::KeyNotFound(key.clone())),
            }
        })
        .await
    }

    /// Record presence for one slot, creating the device if needed.
    pub async fn update_slot(
        &self,
        device_id: &str,
        slot: Slot,
        in_holder: bool,
        timestamp: i64,
    ) -> Result<Device> {
        let key = device_id.to_string();
        self.run("update_slot", move |backend| {
            let stored = backend.update(DEVICES, &key, &mut |current: Option<&[u8]>| {
                let mut device = match current {
                    Some(bytes) => decode::<Device>(bytes)?,
                    None => Device::new(key.clone(), timestamp),
                };
                *device.slot_mut(slot) = crate::entities::SlotState {
                    in_holder,
                    last_state_change: timestamp,
                };
                device.last_seen = timestamp;
                device.online = true;
                Ok(Some(encode(&device)?))
            })?;
            match stored {
                Some(bytes) => decode(&bytes),
                None => Err(StorageError::KeyNotFound(key.clone())),
            }
        })
        .await
    }

    /// Raise the device watermark to `max(last_sequence, sequence)`.
    ///
    /// Returns the watermark after the update. Never lowers it.
    pub async fn advance_sequence(&self, device_id: &str, sequence: i64, now: i64) -> Result<i64> {
        let key = device_id.to_string();
        self.run("advance_sequence", move |backend| {
            let stored = backend.update(DEVICES, &key, &mut |current: Option<&[u8]>| {
                let mut device = match current {
                    Some(bytes) => decode::<Device>(bytes)?,
                    None => Device::new(key.clone(), now),
                };
                if sequence <= device.last_sequence {
                    return Ok(None);
                }
                device.last_sequence = sequence;
                Ok(Some(encode(&device)?))
            })?;
            match stored {
                Some(bytes) => Ok(decode::<Device>(&bytes)?.last_sequence),
                None => Err(StorageError::KeyNotFound(key.clone())),
            }
        })
        .await
    }

    pub async fn get_prescription(&self, device_id: &str, slot: Slot) -> Result<Option<Prescription>> {
        let key = prescription_key(device_id, slot);
        self.run("get_prescription", move |backend| {
            backend.read(PRESCRIPTIONS, &key)?.map(|b| decode(&b)).transpose()
        })
        .await
    }

    pub async fn put_prescription(&self, prescription: &Prescription) -> Result<()> {
        let key = prescription_key(&prescription.device_id, prescription.slot);
        let bytes = encode(prescription)?;
        self.run("put_prescription", move |backend| {
            backend.write(PRESCRIPTIONS, &key, &bytes)
        })
        .await
    }

    /// All prescriptions of one device, ordered by slot.
    pub async fn query_prescriptions(&self, device_id: &str) -> Result<Vec<Prescription>> {
        let device_id = device_id.to_string();
        self.run("query_prescriptions", move |backend| {
            let prefix = format!("{}#", device_id);
            let mut items = Vec::new();
            for (_, bytes) in backend.scan(PRESCRIPTIONS, &prefix)? {
                let prescription: Prescription = decode(&bytes)?;
                // Ids containing '#' can share a prefix with another device.
                if prescription.device_id == device_id {
                    items.push(prescription);
                }
            }
            items.sort_by_key(|p| p.slot);
            Ok(items)
        })
        .await
    }

    /// Every prescription whose bottle is currently out of its holder.
    ///
    /// Records that fail to decode are returned as [`CorruptRecord`] so the
    /// caller can report them without abandoning the rest.
    pub async fn scan_removed(&self) -> Result<Vec<std::result::Result<Prescription, CorruptRecord>>> {
        self.run("scan_removed", move |backend| {
            let mut items = Vec::new();
            for (key, bytes) in backend.scan(PRESCRIPTIONS, "")? {
                match decode::<Prescription>(&bytes) {
                    Ok(p) if p.is_removed() => items.push(Ok(p)),
                    Ok(_) => {}
                    Err(e) => {
                        debug!(key = %key, error = %e, "undecodable prescription");
                        items.push(Err(CorruptRecord {
                            key,
                            error: e.to_string(),
                        }));
                    }
                }
            }
            Ok(items)
        })
        .await
    }

    /// Decrement the count (floored at zero) and mark the bottle out.
    ///
    /// Returns `None` when the slot has no prescription.
    pub async fn record_removal(
        &self,
        device_id: &str,
        slot: Slot,
        timestamp: i64,
    ) -> Result<Option<Removal>> {
        let key = prescription_key(device_id, slot);
        self.run("record_removal", move |backend| {
            let mut previous_count = None;
            let stored = backend.update(PRESCRIPTIONS, &key, &mut |current: Option<&[u8]>| {
                let Some(bytes) = current else {
                    return Ok(None);
                };
                let mut prescription: Prescription = decode(bytes)?;
                previous_count = Some(prescription.pill_count);
                prescription.pill_count = prescription.pill_count.saturating_sub(1);
                prescription.removal_timestamp = Some(timestamp);
                prescription.updated_at = timestamp;
                Ok(Some(encode(&prescription)?))
            })?;
            match (stored, previous_count) {
                (Some(bytes), Some(previous_count)) => Ok(Some(Removal {
                    previous_count,
                    prescription: decode(&bytes)?,
                })),
                _ => Ok(None),
            }
        })
        .await
    }

    /// Clear the bottle-out marker.
    ///
    /// Returns `None` when the slot has no prescription.
    pub async fn record_return(
        &self,
        device_id: &str,
        slot: Slot,
        timestamp: i64,
    ) -> Result<Option<Prescription>> {
        let key = prescription_key(device_id, slot);
        self.run("record_return", move |backend| {
            let mut found = false;
            let stored = backend.update(PRESCRIPTIONS, &key, &mut |current: Option<&[u8]>| {
                let Some(bytes) = current else {
                    return Ok(None);
                };
                found = true;
                let mut prescription: Prescription = decode(bytes)?;
                prescription.removal_timestamp = None;
                prescription.updated_at = timestamp;
                Ok(Some(encode(&prescription)?))
            })?;
            match stored {
                Some(bytes) if found => Ok(Some(decode(&bytes)?)),
                _ => Ok(None),
            }
        })
        .await
    }

    pub async fn append_event(&self, record: &EventRecord) -> Result<()> {
        let key = event_key(&record.device_id, record.timestamp);
        let bytes = encode(record)?;
        self.run("append_event", move |backend| backend.write(EVENTS, &key, &bytes))
            .await
    }

    /// Event-log records for one device, oldest first.
    pub async fn list_events(&self, device_id: &str) -> Result<Vec<EventRecord>> {
        let device_id = device_id.to_string();
        self.run("list_events", move |backend| {
            let prefix = format!("{}#", device_id);
            let mut items = Vec::new();
            for (_, bytes) in backend.scan(EVENTS, &prefix)? {
                let record: EventRecord = decode(&bytes)?;
                if record.device_id == device_id {
                    items.push(record);
                }
            }
            items.sort_by_key(|r| r.timestamp);
            Ok(items)
        })
        .await
    }

    /// Delete event-log records whose TTL has passed. Returns how many.
    pub async fn purge_expired(&self, now_secs: i64) -> Result<usize> {
        self.run("purge_expired", move |backend| {
            let mut removed = 0;
            for (key, bytes) in backend.scan(EVENTS, "")? {
                let expired = decode::<EventRecord>(&bytes)
                    .map(|r| r.is_expired(now_secs))
                    .unwrap_or(false);
                if expired && backend.delete(EVENTS, &key)? {
                    removed += 1;
                }
            }
            Ok(removed)
        })
        .await
    }
}
