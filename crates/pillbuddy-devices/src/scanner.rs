//! Timeout scanner.
//!
//! A sweep over every bottle that is currently out. Bottles out for at least
//! the timeout threshold get a return reminder on every sweep until they are
//! put back. The sweep never writes to the store.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use pillbuddy_core::{SharedEventBus, TrackerEvent};
use pillbuddy_messages::Notifier;
use pillbuddy_storage::PillStore;

use crate::Result;

/// What the sweep did for one prescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanAction {
    Notified,
    WithinTimeout,
    Error,
}

/// One line of a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub device_id: String,
    pub slot: u8,
    pub action: ScanAction,
    /// Time the bottle has been out; absent for `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a full sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub checked: usize,
    pub notified: usize,
    pub within_timeout: usize,
    pub errors: usize,
    pub results: Vec<ScanResult>,
}

impl ScanReport {
    fn push(&mut self, result: ScanResult) {
        self.checked += 1;
        match result.action {
            ScanAction::Notified => self.notified += 1,
            ScanAction::WithinTimeout => self.within_timeout += 1,
            ScanAction::Error => self.errors += 1,
        }
        self.results.push(result);
    }
}

/// Periodic bottle-out sweep.
#[derive(Clone)]
pub struct TimeoutScanner {
    store: PillStore,
    notifier: Notifier,
    event_bus: Option<SharedEventBus>,
    timeout_threshold_ms: i64,
}

impl TimeoutScanner {
    pub fn new(store: PillStore, notifier: Notifier, timeout_threshold_ms: i64) -> Self {
        Self {
            store,
            notifier,
            event_bus: None,
            timeout_threshold_ms,
        }
    }

    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Sweep at `now` (unix millis).
    ///
    /// Fails only when the store cannot be listed at all; a bad record is
    /// reported as an `error` line and the sweep carries on.
    pub async fn scan(&self, now: i64) -> Result<ScanReport> {
        let entries = self.store.scan_removed().await?;
        let mut report = ScanReport::default();

        for entry in entries {
            let prescription = match entry {
                Ok(p) => p,
                Err(corrupt) => {
                    warn!(key = %corrupt.key, error = %corrupt.error, "skipping unreadable prescription");
                    let (device_id, slot) = corrupt
                        .location()
                        .map(|(d, s)| (d.to_string(), s))
                        .unwrap_or_else(|| (corrupt.key.clone(), 0));
                    report.push(ScanResult {
                        device_id,
                        slot,
                        action: ScanAction::Error,
                        elapsed_ms: None,
                        error: Some(corrupt.error),
                    });
                    continue;
                }
            };

            let Some(removed_at) = prescription.removal_timestamp else {
                continue;
            };
            let slot = prescription.slot.number();
            let elapsed = now - removed_at;

            let action = if elapsed >= self.timeout_threshold_ms {
                self.notifier
                    .return_bottle(&prescription.device_id, slot, &prescription.prescription_name)
                    .await;
                if let Some(bus) = &self.event_bus {
                    bus.publish_with_source(
                        TrackerEvent::ReturnReminder {
                            device_id: prescription.device_id.clone(),
                            slot,
                            elapsed_ms: elapsed,
                        },
                        "timeout_scanner",
                    );
                }
                info!(device_id = %prescription.device_id, slot, elapsed_ms = elapsed, "return reminder sent");
                ScanAction::Notified
            } else {
                debug!(device_id = %prescription.device_id, slot, elapsed_ms = elapsed, "within timeout");
                ScanAction::WithinTimeout
            };

            report.push(ScanResult {
                device_id: prescription.device_id,
                slot,
                action,
                elapsed_ms: Some(elapsed),
                error: None,
            });
        }

        info!(
            checked = report.checked,
            notified = report.notified,
            within_timeout = report.within_timeout,
            errors = report.errors,
            "timeout scan complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store() {
        let scanner = TimeoutScanner::new(PillStore::memory(), Notifier::new(), 600_000);
        let report = scanner.scan(1_000).await.unwrap();
        assert_eq!(report, ScanReport::default());
    }

    #[test]
    fn test_report_counts() {
        let mut report = ScanReport::default();
        for action in [ScanAction::Notified, ScanAction::Error, ScanAction::Notified] {
            report.push(ScanResult {
                device_id: "pb-1".to_string(),
                slot: 1,
                action,
                elapsed_ms: None,
                error: None,
            });
        }
        assert_eq!(report.checked, 3);
        assert_eq!(report.notified, 2);
        assert_eq!(report.errors, 1);
    }
}
