//! Indicator-light commands sent back to holders.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use pillbuddy_storage::Slot;

use crate::Result;

/// What the holder should do with a slot's light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedAction {
    TurnOn,
    TurnOff,
}

/// Command payload, `{"action": "turn_off", "slot": 2}` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedCommand {
    pub action: LedAction,
    pub slot: Slot,
}

impl LedCommand {
    pub fn turn_on(slot: Slot) -> Self {
        Self {
            action: LedAction::TurnOn,
            slot,
        }
    }

    pub fn turn_off(slot: Slot) -> Self {
        Self {
            action: LedAction::TurnOff,
            slot,
        }
    }
}

/// Outbound transport for holder commands.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Publish one command to one holder.
    async fn publish(&self, device_id: &str, command: LedCommand) -> Result<()>;
}

/// Publisher that records commands, for tests and offline runs.
#[derive(Debug, Default)]
pub struct MemoryCommandPublisher {
    sent: Mutex<Vec<(String, LedCommand)>>,
}

impl MemoryCommandPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands published so far, oldest first.
    pub fn sent(&self) -> Vec<(String, LedCommand)> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl CommandPublisher for MemoryCommandPublisher {
    async fn publish(&self, device_id: &str, command: LedCommand) -> Result<()> {
        tracing::debug!(device_id, slot = %command.slot, action = ?command.action, "command recorded");
        self.sent.lock().push((device_id.to_string(), command));
        Ok(())
    }
}

#[cfg(feature = "mqtt")]
pub use mqtt_publisher::MqttCommandPublisher;

#[cfg(feature = "mqtt")]
mod mqtt_publisher {
    use async_trait::async_trait;
    use rumqttc::{AsyncClient, QoS};

    use pillbuddy_core::config::topics;

    use super::{CommandPublisher, LedCommand};
    use crate::{Result, TrackerError};

    /// Publishes commands on `pillbuddy/cmd/{device_id}` with QoS 1.
    #[derive(Clone)]
    pub struct MqttCommandPublisher {
        client: AsyncClient,
    }

    impl MqttCommandPublisher {
        pub fn new(client: AsyncClient) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl CommandPublisher for MqttCommandPublisher {
        async fn publish(&self, device_id: &str, command: LedCommand) -> Result<()> {
            let payload = serde_json::to_vec(&command)
                .map_err(|e| TrackerError::Command(format!("Failed to serialize command: {}", e)))?;
            self.client
                .publish(topics::command_topic(device_id), QoS::AtLeastOnce, false, payload)
                .await
                .map_err(|e| TrackerError::Command(format!("Failed to publish command: {}", e)))
        }
    }
}
