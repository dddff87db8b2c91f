//! Timeout scanner tests.

use std::sync::Arc;

use pillbuddy_core::config::limits::TIMEOUT_THRESHOLD_MS;
use pillbuddy_core::storage::StorageBackend;
use pillbuddy_core::{EventBus, TrackerEvent};
use pillbuddy_devices::{ScanAction, TimeoutScanner};
use pillbuddy_messages::{MemoryChannel, Notifier};
use pillbuddy_storage::{PillStore, Prescription, Slot};

const MINUTE: i64 = 60 * 1000;
const NOW: i64 = 1_700_000_000_000;

async fn scanner(store: &PillStore) -> (TimeoutScanner, MemoryChannel) {
    let notifier = Notifier::new();
    let sink = MemoryChannel::new("sink".to_string());
    notifier.register(Arc::new(sink.clone())).await;
    (
        TimeoutScanner::new(store.clone(), notifier, TIMEOUT_THRESHOLD_MS),
        sink,
    )
}

async fn removed_at(store: &PillStore, slot: u8, name: &str, at: i64) {
    let slot = Slot::new(slot).unwrap();
    store
        .put_prescription(&Prescription::new("pb-1", slot, name, 10, true, 0))
        .await
        .unwrap();
    store.record_removal("pb-1", slot, at).await.unwrap();
}

#[tokio::test]
async fn test_eleven_minutes_notifies_nine_does_not() {
    let store = PillStore::memory();
    removed_at(&store, 1, "Aspirin", NOW - 11 * MINUTE).await;
    removed_at(&store, 2, "Metformin", NOW - 9 * MINUTE).await;
    let (scanner, sink) = scanner(&store).await;

    let report = scanner.scan(NOW).await.unwrap();

    assert_eq!(report.checked, 2);
    assert_eq!(report.notified, 1);
    assert_eq!(report.within_timeout, 1);
    let by_slot = |n: u8| report.results.iter().find(|r| r.slot == n).unwrap();
    assert_eq!(by_slot(1).action, ScanAction::Notified);
    assert_eq!(by_slot(1).elapsed_ms, Some(11 * MINUTE));
    assert_eq!(by_slot(2).action, ScanAction::WithinTimeout);
    assert_eq!(
        sink.texts().await,
        vec!["Reminder: Please return your Aspirin bottle to slot 1 of your PillBuddy."]
    );
}

#[tokio::test]
async fn test_reminder_published_from_scanner() {
    let store = PillStore::memory();
    removed_at(&store, 2, "Aspirin", NOW - 12 * MINUTE).await;
    let bus = Arc::new(EventBus::new());
    let mut rx = bus.subscribe();
    let (scanner, _) = scanner(&store).await;
    let scanner = scanner.with_event_bus(bus.clone());

    scanner.scan(NOW).await.unwrap();

    let (event, meta) = rx.try_recv().unwrap();
    assert_eq!(
        event,
        TrackerEvent::ReturnReminder {
            device_id: "pb-1".to_string(),
            slot: 2,
            elapsed_ms: 12 * MINUTE,
        }
    );
    assert_eq!(meta.source, "timeout_scanner");
    assert!(rx.try_recv().is_none());
}

#[tokio::test]
async fn test_exact_threshold_notifies() {
    let store = PillStore::memory();
    removed_at(&store, 3, "Aspirin", NOW - TIMEOUT_THRESHOLD_MS).await;
    let (scanner, _) = scanner(&store).await;

    let report = scanner.scan(NOW).await.unwrap();
    assert_eq!(report.results[0].action, ScanAction::Notified);
}

#[tokio::test]
async fn test_scan_does_not_mutate_and_renotifies() {
    let store = PillStore::memory();
    removed_at(&store, 1, "Aspirin", NOW - 20 * MINUTE).await;
    let before = store
        .get_prescription("pb-1", Slot::new(1).unwrap())
        .await
        .unwrap();
    let (scanner, sink) = scanner(&store).await;

    scanner.scan(NOW).await.unwrap();
    scanner.scan(NOW + 5 * MINUTE).await.unwrap();

    let after = store
        .get_prescription("pb-1", Slot::new(1).unwrap())
        .await
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(sink.count().await, 2);
}

#[tokio::test]
async fn test_returned_bottles_are_not_checked() {
    let store = PillStore::memory();
    removed_at(&store, 1, "Aspirin", NOW - 20 * MINUTE).await;
    store
        .record_return("pb-1", Slot::new(1).unwrap(), NOW - 15 * MINUTE)
        .await
        .unwrap();
    let (scanner, sink) = scanner(&store).await;

    let report = scanner.scan(NOW).await.unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(sink.count().await, 0);
}

#[tokio::test]
async fn test_corrupt_record_is_scoped() {
    let store = PillStore::memory();
    store
        .backend()
        .write("prescriptions", "pb-2#3", b"{broken")
        .unwrap();
    removed_at(&store, 1, "Aspirin", NOW - 30 * MINUTE).await;
    let (scanner, sink) = scanner(&store).await;

    let report = scanner.scan(NOW).await.unwrap();

    assert_eq!(report.errors, 1);
    assert_eq!(report.notified, 1);
    let failed = report
        .results
        .iter()
        .find(|r| r.action == ScanAction::Error)
        .unwrap();
    assert_eq!((failed.device_id.as_str(), failed.slot), ("pb-2", 3));
    assert!(failed.error.is_some());
    assert_eq!(sink.count().await, 1);
}
