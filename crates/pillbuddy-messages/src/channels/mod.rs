//! Notification channels for delivering reminders.

pub mod console;
pub mod memory;

#[cfg(feature = "webhook")]
pub mod webhook;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Notification, Result};

pub use console::ConsoleChannel;
pub use memory::MemoryChannel;

#[cfg(feature = "webhook")]
pub use webhook::WebhookChannel;

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Get the channel name.
    fn name(&self) -> &str;

    /// Get the channel type.
    fn channel_type(&self) -> &str;

    /// Check if the channel is enabled.
    fn is_enabled(&self) -> bool;

    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Channels keyed by name. Registering a name twice replaces the first.
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Arc<dyn NotificationChannel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Register a channel instance.
    pub async fn register(&self, channel: Arc<dyn NotificationChannel>) {
        let name = channel.name().to_string();
        self.channels.write().await.insert(name, channel);
    }

    /// All enabled channels, sorted by name.
    pub async fn enabled(&self) -> Vec<Arc<dyn NotificationChannel>> {
        let mut enabled: Vec<_> = self
            .channels
            .read()
            .await
            .values()
            .filter(|c| c.is_enabled())
            .cloned()
            .collect();
        enabled.sort_by(|a, b| a.name().cmp(b.name()));
        enabled
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
