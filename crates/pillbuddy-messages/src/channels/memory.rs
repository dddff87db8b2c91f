//! Memory notification channel (for testing).

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::NotificationChannel;
use crate::{Error, Notification, Result};

/// In-memory channel that keeps every delivered notification.
///
/// Clones share the same buffer, so a test can keep one handle and register
/// the other.
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    name: String,
    enabled: bool,
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryChannel {
    pub fn new(name: String) -> Self {
        Self {
            name,
            enabled: true,
            notifications: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn disabled(name: String) -> Self {
        Self {
            enabled: false,
            ..Self::new(name)
        }
    }

    pub async fn get_notifications(&self) -> Vec<Notification> {
        self.notifications.lock().await.clone()
    }

    /// Delivered texts in order.
    pub async fn texts(&self) -> Vec<String> {
        self.notifications
            .lock()
            .await
            .iter()
            .map(|n| n.text.clone())
            .collect()
    }

    pub async fn clear(&self) {
        self.notifications.lock().await.clear();
    }

    pub async fn count(&self) -> usize {
        self.notifications.lock().await.len()
    }
}

#[async_trait]
impl NotificationChannel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_type(&self) -> &str {
        "memory"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        if !self.enabled {
            return Err(Error::ChannelDisabled(self.name.clone()));
        }
        self.notifications.lock().await.push(notification.clone());
        Ok(())
    }
}
