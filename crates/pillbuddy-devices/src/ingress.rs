//! Ingress adapter.
//!
//! Holders publish a minimal envelope (`event_type`, `slot`, `in_holder`);
//! the broker-side rule may enrich it with `device_id`, `ts_ms`, `sequence`,
//! `state` and `sensor_level`. Both shapes decode into [`RawEnvelope`] and
//! are normalised into one [`CanonicalEvent`].

use serde::{Deserialize, Serialize};

use crate::{Result, TrackerError};

/// Kinds of event a holder can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A bottle entered or left a slot.
    SlotStateChanged,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlotStateChanged => "slot_state_changed",
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "slot_state_changed" => Ok(Self::SlotStateChanged),
            other => Err(TrackerError::validation(format!(
                "Unknown event type: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire form: every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_holder: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_level: Option<u8>,
}

impl RawEnvelope {
    /// Decode a JSON payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| TrackerError::validation(format!("Malformed event JSON: {}", e)))
    }

    /// Fill `device_id` from the transport when the payload has none.
    pub fn with_fallback_device(mut self, device_id: Option<&str>) -> Self {
        let missing = self
            .device_id
            .as_deref()
            .map_or(true, |id| id.trim().is_empty());
        if missing {
            if let Some(id) = device_id {
                self.device_id = Some(id.to_string());
            }
        }
        self
    }
}

/// Normalised slot event.
///
/// `slot` is kept as received; range checking belongs to the slot state
/// updater so an out-of-range slot is rejected before any write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub device_id: String,
    pub kind: EventKind,
    pub slot: i64,
    pub in_holder: bool,
    /// Event time (unix millis).
    pub timestamp: i64,
    /// Device sequence number; `0` means unsequenced.
    pub sequence: i64,
    pub state: String,
    pub sensor_level: u8,
}

impl CanonicalEvent {
    /// Normalise an envelope, filling defaults from `now` (unix millis).
    pub fn from_envelope(raw: RawEnvelope, now: i64) -> Result<Self> {
        let device_id = raw
            .device_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| TrackerError::validation("device_id required"))?;
        let kind = raw
            .event_type
            .as_deref()
            .ok_or_else(|| TrackerError::validation("event_type required"))?
            .parse::<EventKind>()?;
        let slot = raw
            .slot
            .ok_or_else(|| TrackerError::validation("slot required"))?;
        let in_holder = raw
            .in_holder
            .ok_or_else(|| TrackerError::validation("in_holder required"))?;

        Ok(Self {
            device_id,
            kind,
            slot,
            in_holder,
            timestamp: raw.ts_ms.unwrap_or(now),
            sequence: raw.sequence.unwrap_or(0),
            state: raw.state.unwrap_or_else(|| default_state(in_holder).to_string()),
            sensor_level: raw.sensor_level.unwrap_or(u8::from(in_holder)),
        })
    }

    /// Decode and normalise a payload in one step.
    pub fn parse(payload: &[u8], topic_device: Option<&str>, now: i64) -> Result<Self> {
        let raw = RawEnvelope::from_slice(payload)?.with_fallback_device(topic_device);
        Self::from_envelope(raw, now)
    }
}

fn default_state(in_holder: bool) -> &'static str {
    if in_holder {
        "in_holder"
    } else {
        "not_in_holder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_envelope_defaults() {
        let event =
            CanonicalEvent::parse(br#"{"event_type":"slot_state_changed","slot":2,"in_holder":false}"#, Some("pb-1"), 1_000)
                .unwrap();
        assert_eq!(event.device_id, "pb-1");
        assert_eq!(event.kind, EventKind::SlotStateChanged);
        assert_eq!(event.timestamp, 1_000);
        assert_eq!(event.sequence, 0);
        assert_eq!(event.state, "not_in_holder");
        assert_eq!(event.sensor_level, 0);
    }

    #[test]
    fn test_enriched_envelope_kept() {
        let payload = br#"{"device_id":"pb-2","event_type":"slot_state_changed","slot":1,
            "in_holder":true,"ts_ms":42,"sequence":7,"state":"in_holder","sensor_level":1}"#;
        let event = CanonicalEvent::parse(payload, Some("pb-topic"), 0).unwrap();
        assert_eq!(event.device_id, "pb-2");
        assert_eq!(event.timestamp, 42);
        assert_eq!(event.sequence, 7);
        assert_eq!(event.sensor_level, 1);
    }

    #[test]
    fn test_missing_device_rejected() {
        let err = CanonicalEvent::parse(
            br#"{"event_type":"slot_state_changed","slot":1,"in_holder":true}"#,
            None,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, TrackerError::Validation(ref m) if m.contains("device_id")));
    }

    #[test]
    fn test_blank_device_uses_topic() {
        let raw = RawEnvelope {
            device_id: Some("  ".to_string()),
            ..Default::default()
        }
        .with_fallback_device(Some("pb-3"));
        assert_eq!(raw.device_id.as_deref(), Some("pb-3"));
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        let err = CanonicalEvent::parse(
            br#"{"device_id":"pb-1","event_type":"battery_low","slot":1,"in_holder":true}"#,
            None,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            CanonicalEvent::parse(b"{not json", Some("pb-1"), 0),
            Err(TrackerError::Validation(_))
        ));
    }

    #[test]
    fn test_out_of_range_slot_passes_ingress() {
        let event = CanonicalEvent::parse(
            br#"{"device_id":"pb-1","event_type":"slot_state_changed","slot":4,"in_holder":true}"#,
            None,
            0,
        )
        .unwrap();
        assert_eq!(event.slot, 4);
    }
}
