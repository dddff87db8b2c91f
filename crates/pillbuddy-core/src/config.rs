//! Shared configuration: tracker constants, MQTT topic layout, and the
//! environment variables that override them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed tracker limits.
pub mod limits {
    /// Pill count below which a refill/dispose reminder is sent.
    pub const REFILL_THRESHOLD: u32 = 5;
    /// How long a bottle may stay out of its slot before a return reminder.
    pub const TIMEOUT_THRESHOLD_MS: i64 = 10 * 60 * 1000;
    /// Event-log records expire this many days after their timestamp.
    pub const EVENT_TTL_DAYS: i64 = 30;
    /// Cadence the scanner is expected to run at.
    pub const SCAN_INTERVAL_SECS: u64 = 5 * 60;
    /// Upper bound for a single store call.
    pub const STORE_TIMEOUT_MS: u64 = 5_000;
    /// Slots per holder. Slot numbers run from 1 to this value.
    pub const SLOT_COUNT: u8 = 3;
}

/// MQTT topic layout shared with the holder firmware.
pub mod topics {
    /// Devices publish slot events here, suffixed with the device id.
    pub const EVENTS_PREFIX: &str = "pillbuddy/events/";
    /// Wildcard subscription covering every device.
    pub const EVENTS_WILDCARD: &str = "pillbuddy/events/+";
    /// Indicator-light commands go here, suffixed with the device id.
    pub const COMMAND_PREFIX: &str = "pillbuddy/cmd/";

    /// Command topic for one device.
    pub fn command_topic(device_id: &str) -> String {
        format!("{}{}", COMMAND_PREFIX, device_id)
    }

    /// Extract the device id from an events topic.
    pub fn device_from_events_topic(topic: &str) -> Option<&str> {
        topic
            .strip_prefix(EVENTS_PREFIX)
            .filter(|id| !id.is_empty() && !id.contains('/'))
    }
}

/// Environment variable names.
pub mod env_vars {
    use super::limits;

    pub const DATA_DIR: &str = "PILLBUDDY_DATA_DIR";
    pub const MQTT_BROKER: &str = "PILLBUDDY_MQTT_BROKER";
    pub const MQTT_PORT: &str = "PILLBUDDY_MQTT_PORT";
    pub const LOG_JSON: &str = "PILLBUDDY_LOG_JSON";
    pub const REFILL_THRESHOLD: &str = "PILLBUDDY_REFILL_THRESHOLD";
    pub const TIMEOUT_THRESHOLD_MS: &str = "PILLBUDDY_TIMEOUT_THRESHOLD_MS";
    pub const SCAN_INTERVAL_SECS: &str = "PILLBUDDY_SCAN_INTERVAL_SECS";
    pub const STORE_TIMEOUT_MS: &str = "PILLBUDDY_STORE_TIMEOUT_MS";
    pub const WEBHOOK_URL: &str = "PILLBUDDY_WEBHOOK_URL";

    fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
        std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
    }

    /// Like `parsed`, but a zero value counts as unset.
    fn positive(name: &str) -> Option<u64> {
        parsed(name).filter(|v: &u64| *v > 0)
    }

    /// Refill threshold from the environment, or the default.
    pub fn refill_threshold() -> u32 {
        parsed(REFILL_THRESHOLD).unwrap_or(limits::REFILL_THRESHOLD)
    }

    /// Bottle-out timeout from the environment, or the default.
    pub fn timeout_threshold_ms() -> i64 {
        parsed(TIMEOUT_THRESHOLD_MS).unwrap_or(limits::TIMEOUT_THRESHOLD_MS)
    }

    /// Scanner cadence from the environment, or the default.
    pub fn scan_interval_secs() -> u64 {
        positive(SCAN_INTERVAL_SECS).unwrap_or(limits::SCAN_INTERVAL_SECS)
    }

    /// Store call timeout from the environment, or the default.
    pub fn store_timeout_ms() -> u64 {
        positive(STORE_TIMEOUT_MS).unwrap_or(limits::STORE_TIMEOUT_MS)
    }

    /// Whether logs should be emitted as JSON.
    pub fn log_json() -> bool {
        parsed(LOG_JSON).unwrap_or(false)
    }
}

/// Tunables for event processing and the timeout scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub refill_threshold: u32,
    pub timeout_threshold_ms: i64,
    pub event_ttl_days: i64,
    pub scan_interval_secs: u64,
    pub store_timeout_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            refill_threshold: limits::REFILL_THRESHOLD,
            timeout_threshold_ms: limits::TIMEOUT_THRESHOLD_MS,
            event_ttl_days: limits::EVENT_TTL_DAYS,
            scan_interval_secs: limits::SCAN_INTERVAL_SECS,
            store_timeout_ms: limits::STORE_TIMEOUT_MS,
        }
    }
}

impl TrackerConfig {
    /// Defaults overlaid with any `PILLBUDDY_*` environment overrides.
    pub fn from_env() -> Self {
        Self {
            refill_threshold: env_vars::refill_threshold(),
            timeout_threshold_ms: env_vars::timeout_threshold_ms(),
            event_ttl_days: limits::EVENT_TTL_DAYS,
            scan_interval_secs: env_vars::scan_interval_secs(),
            store_timeout_ms: env_vars::store_timeout_ms(),
        }
    }

    pub fn with_refill_threshold(mut self, threshold: u32) -> Self {
        self.refill_threshold = threshold;
        self
    }

    pub fn with_timeout_threshold_ms(mut self, threshold_ms: i64) -> Self {
        self.timeout_threshold_ms = threshold_ms;
        self
    }

    pub fn with_store_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.store_timeout_ms = timeout_ms;
        self
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Never zero; a zero interval would make `tokio::time::interval` panic.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs.max(1))
    }

    /// Event-log TTL in seconds since epoch for a record stamped `timestamp_ms`.
    pub fn event_ttl_secs(&self, timestamp_ms: i64) -> i64 {
        timestamp_ms / 1000 + self.event_ttl_days * 24 * 60 * 60
    }
}
