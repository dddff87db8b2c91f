//! Console notification channel.

use async_trait::async_trait;

use super::NotificationChannel;
use crate::{Notification, Result};

/// Console channel printing each reminder's text to stdout.
#[derive(Debug, Clone)]
pub struct ConsoleChannel {
    name: String,
}

impl ConsoleChannel {
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

#[async_trait]
impl NotificationChannel for ConsoleChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_type(&self) -> &str {
        "console"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        println!("{}", notification.text);
        Ok(())
    }
}
