//! Notifier gateway.
//!
//! Formats reminder text and fans each notification out to every enabled
//! channel. Delivery is best-effort: a failing channel is logged and the
//! rest still receive the notification, and callers never see an error.

use std::sync::Arc;

use crate::channels::{ChannelRegistry, ConsoleChannel, NotificationChannel};
use crate::{wording, Notification, ReminderKind};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

impl Delivery {
    /// True when at least one channel accepted the notification.
    pub fn any_delivered(&self) -> bool {
        self.delivered > 0
    }
}

/// Fire-and-forget reminder dispatch.
#[derive(Clone)]
pub struct Notifier {
    channels: Arc<ChannelRegistry>,
}

impl Notifier {
    /// Notifier with no channels; everything is dropped until one is added.
    pub fn new() -> Self {
        Self {
            channels: Arc::new(ChannelRegistry::new()),
        }
    }

    /// Notifier that prints to stdout.
    pub async fn console() -> Self {
        let notifier = Self::new();
        notifier
            .register(Arc::new(ConsoleChannel::new("console".to_string())))
            .await;
        notifier
    }

    pub async fn register(&self, channel: Arc<dyn NotificationChannel>) {
        self.channels.register(channel).await;
    }

    /// Deliver to every enabled channel.
    pub async fn notify(&self, notification: &Notification) -> Delivery {
        let mut delivery = Delivery::default();
        for channel in self.channels.enabled().await {
            match channel.send(notification).await {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    delivery.failed += 1;
                    tracing::warn!(
                        channel = channel.name(),
                        device_id = %notification.device_id,
                        error = %e,
                        "Failed to deliver notification"
                    );
                }
            }
        }

        if delivery.failed > 0 && !delivery.any_delivered() {
            tracing::warn!(
                device_id = %notification.device_id,
                kind = %notification.kind,
                "All channels failed for notification"
            );
        }

        tracing::info!(
            device_id = %notification.device_id,
            kind = %notification.kind,
            delivered = delivery.delivered,
            "{}",
            notification.summary()
        );

        delivery
    }

    /// Congratulate the user on a dose.
    pub async fn dose_taken(
        &self,
        device_id: &str,
        slot: u8,
        name: &str,
        count_before: u32,
    ) -> Delivery {
        let text = wording::dose_taken(name, count_before);
        self.notify(&Notification::new(ReminderKind::DoseTaken, device_id, text).with_slot(slot))
            .await
    }

    /// Warn about low stock.
    pub async fn refill_needed(
        &self,
        device_id: &str,
        slot: u8,
        name: &str,
        remaining: u32,
        has_refills: bool,
    ) -> Delivery {
        let text = wording::refill_needed(name, remaining, has_refills);
        self.notify(&Notification::new(ReminderKind::RefillNeeded, device_id, text).with_slot(slot))
            .await
    }

    /// Ask for a bottle to be put back.
    pub async fn return_bottle(&self, device_id: &str, slot: u8, name: &str) -> Delivery {
        let text = wording::return_bottle(name, slot);
        self.notify(&Notification::new(ReminderKind::ReturnBottle, device_id, text).with_slot(slot))
            .await
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
