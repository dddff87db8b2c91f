//! Notifier fan-out tests.

use std::sync::Arc;

use async_trait::async_trait;
use pillbuddy_messages::{
    Error, MemoryChannel, Notification, NotificationChannel, Notifier, ReminderKind, Result,
};

/// Channel that always fails.
struct BrokenChannel;

#[async_trait]
impl NotificationChannel for BrokenChannel {
    fn name(&self) -> &str {
        "broken"
    }

    fn channel_type(&self) -> &str {
        "test"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn send(&self, _notification: &Notification) -> Result<()> {
        Err(Error::SendFailed("offline".to_string()))
    }
}

#[tokio::test]
async fn test_failed_channel_does_not_block_others() {
    let notifier = Notifier::new();
    let sink = MemoryChannel::new("sink".to_string());
    notifier.register(Arc::new(BrokenChannel)).await;
    notifier.register(Arc::new(sink.clone())).await;

    let delivery = notifier.return_bottle("pb-1", 3, "Metformin").await;

    assert_eq!(delivery.delivered, 1);
    assert_eq!(delivery.failed, 1);
    assert_eq!(
        sink.texts().await,
        vec!["Reminder: Please return your Metformin bottle to slot 3 of your PillBuddy."]
    );
}

#[tokio::test]
async fn test_no_channels_is_silent() {
    let notifier = Notifier::new();
    let delivery = notifier
        .notify(&Notification::new(ReminderKind::DoseTaken, "pb-1", "hello"))
        .await;
    assert!(!delivery.any_delivered());
    assert_eq!(delivery.failed, 0);
}

#[tokio::test]
async fn test_disabled_channel_is_skipped() {
    let notifier = Notifier::new();
    let off = MemoryChannel::disabled("off".to_string());
    notifier.register(Arc::new(off.clone())).await;

    let delivery = notifier.refill_needed("pb-1", 1, "Aspirin", 2, true).await;
    assert_eq!(delivery.failed, 0);
    assert_eq!(off.count().await, 0);
}

#[tokio::test]
async fn test_reminders_carry_slot_and_kind() {
    let notifier = Notifier::new();
    let sink = MemoryChannel::new("sink".to_string());
    notifier.register(Arc::new(sink.clone())).await;

    notifier.dose_taken("pb-1", 2, "Aspirin", 5).await;
    notifier.refill_needed("pb-1", 2, "Aspirin", 4, false).await;

    let sent = sink.get_notifications().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].kind, ReminderKind::DoseTaken);
    assert_eq!(sent[0].slot, Some(2));
    assert_eq!(
        sent[0].text,
        "Well done! Your Aspirin has been taken. You have 5 pills remaining."
    );
    assert_eq!(sent[1].kind, ReminderKind::RefillNeeded);
    assert!(sent[1].text.ends_with("Please dispose of the empty bottle."));
}
