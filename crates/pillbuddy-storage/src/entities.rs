//! Persistent entities: holder devices, per-slot prescriptions and the
//! append-only slot event log.

use serde::{Deserialize, Serialize};

use pillbuddy_core::config::limits::SLOT_COUNT;

/// One of the three fixed bottle positions on a holder.
///
/// Construction validates the range, so any `Slot` in hand is 1, 2 or 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Slot(u8);

impl Slot {
    /// All slots in order.
    pub const ALL: [Slot; SLOT_COUNT as usize] = [Slot(1), Slot(2), Slot(3)];

    /// Validate a raw slot number.
    pub fn new(number: u8) -> Option<Self> {
        (1..=SLOT_COUNT).contains(&number).then_some(Self(number))
    }

    /// Validate a slot number of any integer width.
    pub fn from_i64(number: i64) -> Option<Self> {
        u8::try_from(number).ok().and_then(Self::new)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for Slot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Slot::new(value).ok_or_else(|| format!("slot must be 1..={}, got {}", SLOT_COUNT, value))
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> Self {
        slot.0
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Presence state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotState {
    pub in_holder: bool,
    /// Timestamp of the last applied event for this slot (unix millis).
    pub last_state_change: i64,
}

/// A pill holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub online: bool,
    /// Last contact (unix millis).
    pub last_seen: i64,
    /// Highest applied event sequence; `-1` until a sequenced event lands.
    #[serde(default = "no_sequence")]
    pub last_sequence: i64,
    pub slots: [SlotState; SLOT_COUNT as usize],
    pub created_at: i64,
}

fn no_sequence() -> i64 {
    -1
}

impl Device {
    /// A freshly seen holder with every slot empty.
    pub fn new(device_id: impl Into<String>, now: i64) -> Self {
        let empty = SlotState {
            in_holder: false,
            last_state_change: now,
        };
        Self {
            device_id: device_id.into(),
            online: false,
            last_seen: now,
            last_sequence: no_sequence(),
            slots: [empty; SLOT_COUNT as usize],
            created_at: now,
        }
    }

    pub fn slot(&self, slot: Slot) -> &SlotState {
        &self.slots[slot.index()]
    }

    pub fn slot_mut(&mut self, slot: Slot) -> &mut SlotState {
        &mut self.slots[slot.index()]
    }
}

/// Medication configured for one slot of one holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub device_id: String,
    pub slot: Slot,
    pub prescription_name: String,
    pub pill_count: u32,
    pub initial_count: u32,
    pub has_refills: bool,
    /// Set while the bottle is out of the holder (unix millis).
    #[serde(default)]
    pub removal_timestamp: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Prescription {
    pub fn new(
        device_id: impl Into<String>,
        slot: Slot,
        prescription_name: impl Into<String>,
        pill_count: u32,
        has_refills: bool,
        now: i64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            slot,
            prescription_name: prescription_name.into(),
            pill_count,
            initial_count: pill_count,
            has_refills,
            removal_timestamp: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.removal_timestamp.is_some()
    }

    /// Name used in reminder wording.
    pub fn display_name(&self) -> &str {
        if self.prescription_name.trim().is_empty() {
            "medication"
        } else {
            &self.prescription_name
        }
    }
}

/// One applied slot event, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub device_id: String,
    /// Event time (unix millis).
    pub timestamp: i64,
    pub event_type: String,
    pub slot: u8,
    pub state: String,
    pub in_holder: bool,
    pub sensor_level: u8,
    pub sequence: i64,
    /// Expiry instant (unix seconds).
    pub ttl: i64,
}

impl EventRecord {
    pub fn is_expired(&self, now_secs: i64) -> bool {
        self.ttl <= now_secs
    }
}
