//! Tests for the tracker EventBus.
//!
//! Tests include:
//! - Multiple subscribers
//! - Filtered subscriptions
//! - Publishing from concurrent tasks

use pillbuddy_core::{EventBus, SharedEventBus, TrackerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn dose(device: &str, remaining: u32) -> TrackerEvent {
    TrackerEvent::DoseTaken {
        device_id: device.to_string(),
        slot: 1,
        remaining,
        timestamp: 0,
    }
}

#[tokio::test]
async fn test_event_bus_multiple_subscribers() {
    let bus = EventBus::new();
    let mut rx1 = bus.subscribe();
    let mut rx2 = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 2);

    bus.publish(dose("pb-1", 9));

    assert_eq!(rx1.recv().await.unwrap().0.type_name(), "dose_taken");
    assert_eq!(rx2.recv().await.unwrap().0.type_name(), "dose_taken");
}

#[tokio::test]
async fn test_event_bus_carries_source() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    bus.publish_with_source(
        TrackerEvent::ReturnReminder {
            device_id: "pb-1".to_string(),
            slot: 2,
            elapsed_ms: 660_000,
        },
        "timeout_scanner",
    );

    let (event, meta) = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, TrackerEvent::ReturnReminder { slot: 2, .. }));
    assert_eq!(meta.source, "timeout_scanner");
}

#[tokio::test]
async fn test_event_bus_concurrent_publishers() {
    let bus: SharedEventBus = Arc::new(EventBus::new());
    let mut rx = bus.subscribe();

    let mut handles = Vec::new();
    for i in 0..4 {
        let bus = bus.clone();
        handles.push(tokio::spawn(async move {
            bus.publish(dose(&format!("pb-{}", i), i));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut seen = Vec::new();
    while let Some((event, _)) = rx.try_recv() {
        seen.push(event.device_id().to_string());
    }
    seen.sort();
    assert_eq!(seen, vec!["pb-0", "pb-1", "pb-2", "pb-3"]);
}
