//! MQTT ingestion.
//!
//! Subscribes to `pillbuddy/events/+` and feeds every publish to the
//! [`EventProcessor`]. Acks are manual: a publish is acknowledged once it
//! has been applied, found to be a duplicate, or rejected as invalid. A
//! store failure leaves it unacknowledged so the broker redelivers it on
//! the persistent session.
//!
//! Each device topic gets its own worker task, so one holder's events are
//! handled in arrival order while different holders proceed in parallel.

use std::collections::HashMap;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use pillbuddy_core::config::{env_vars, topics};

use crate::processor::{EventProcessor, ProcessOutcome};
use crate::{Result, TrackerError};

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Consecutive poll errors tolerated before the loop gives up.
    #[serde(default = "default_max_errors")]
    pub max_errors: u32,
}

fn default_keep_alive() -> u64 {
    60
}

fn default_max_errors() -> u32 {
    5
}

impl MqttConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: format!("pillbuddy-{}", uuid::Uuid::new_v4()),
            keep_alive_secs: default_keep_alive(),
            max_errors: default_max_errors(),
        }
    }

    /// Broker from `PILLBUDDY_MQTT_BROKER` / `PILLBUDDY_MQTT_PORT`, or
    /// `localhost:1883`.
    pub fn from_env() -> Self {
        let host = std::env::var(env_vars::MQTT_BROKER).unwrap_or_else(|_| "localhost".to_string());
        let port = std::env::var(env_vars::MQTT_PORT)
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(1883);
        Self::new(host, port)
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs));
        options.set_clean_session(false);
        options.set_manual_acks(true);
        options
    }
}

/// Publishes a device worker may have queued before the loop waits on it.
const DEVICE_QUEUE: usize = 32;

/// Open a client for `config`. The event loop does nothing until polled.
pub fn connect(config: &MqttConfig) -> (AsyncClient, EventLoop) {
    AsyncClient::new(config.options(), 10)
}

/// Subscribe to holder events and process them until the connection fails
/// `max_errors` times in a row.
pub async fn run_ingest(
    processor: EventProcessor,
    client: AsyncClient,
    mut eventloop: EventLoop,
    max_errors: u32,
) -> Result<()> {
    client
        .subscribe(topics::EVENTS_WILDCARD, QoS::AtLeastOnce)
        .await
        .map_err(|e| TrackerError::Transport(format!("Failed to subscribe: {}", e)))?;
    info!(topic = topics::EVENTS_WILDCARD, "subscribed to holder events");

    let mut workers: HashMap<String, mpsc::Sender<Publish>> = HashMap::new();
    let mut error_count = 0;
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                error_count = 0;
                let key = topics::device_from_events_topic(&publish.topic)
                    .unwrap_or(publish.topic.as_str())
                    .to_string();
                let worker = workers
                    .entry(key.clone())
                    .or_insert_with(|| spawn_device_worker(processor.clone(), client.clone()))
                    .clone();
                if worker.send(publish).await.is_err() {
                    // Unacked, so the broker sends it again.
                    warn!(device = %key, "device worker gone, dropping publish");
                    workers.remove(&key);
                }
            }
            Ok(_) => {
                error_count = 0;
            }
            Err(e) => {
                error_count += 1;
                if error_count >= max_errors {
                    error!(error_count, error = %e, "MQTT error count reached limit, stopping");
                    return Err(TrackerError::Transport(e.to_string()));
                }
                warn!("MQTT error ({}/{}): {}", error_count, max_errors, e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Worker that handles one device's publishes in order.
fn spawn_device_worker(processor: EventProcessor, client: AsyncClient) -> mpsc::Sender<Publish> {
    let (tx, mut rx) = mpsc::channel::<Publish>(DEVICE_QUEUE);
    tokio::spawn(async move {
        while let Some(publish) = rx.recv().await {
            handle_publish(&processor, &client, publish).await;
        }
    });
    tx
}

async fn handle_publish(processor: &EventProcessor, client: &AsyncClient, publish: Publish) {
    let topic_device = topics::device_from_events_topic(&publish.topic);
    let now = chrono::Utc::now().timestamp_millis();

    match processor.handle_payload(&publish.payload, topic_device, now).await {
        Ok(outcome) => {
            match &outcome {
                ProcessOutcome::Applied { device_id, slot, .. } => {
                    debug!(device_id = %device_id, slot, topic = %publish.topic, "event applied")
                }
                ProcessOutcome::Duplicate { device_id, sequence, .. } => {
                    debug!(device_id = %device_id, sequence, "duplicate acknowledged")
                }
                ProcessOutcome::Rejected { reason } => {
                    warn!(topic = %publish.topic, %reason, "invalid event dropped")
                }
            }
            if let Err(e) = client.ack(&publish).await {
                warn!(topic = %publish.topic, error = %e, "failed to ack publish");
            }
        }
        Err(e) => {
            error!(topic = %publish.topic, error = %e, "event not applied, leaving unacknowledged");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MqttConfig::new("broker.local", 1884).with_client_id("pb-server");
        assert_eq!(config.client_id, "pb-server");
        assert_eq!(config.keep_alive_secs, 60);
        assert_eq!(config.max_errors, 5);

        let options = config.options();
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
        assert!(!options.clean_session());
        assert!(options.manual_acks());
    }
}
