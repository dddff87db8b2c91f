//! Notification types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::ReminderKind;

/// Unique notification identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub Uuid);

impl NotificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Severity {
    /// Encouragement, no action required
    #[default]
    Info = 0,
    /// The user should act soon
    Warning = 1,
    /// The user should act now
    Critical = 2,
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    // Serialize as lowercase string
    pub fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            _ => Err(serde::de::Error::custom(format!("invalid severity: {}", s))),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A human-readable reminder addressed to the owner of a holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: ReminderKind,
    #[serde(
        serialize_with = "Severity::serialize",
        deserialize_with = "Severity::deserialize"
    )]
    pub severity: Severity,
    /// Holder the reminder concerns.
    pub device_id: String,
    /// Slot the reminder concerns, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u8>,
    /// Text as it should be read to the user.
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: ReminderKind, device_id: impl Into<String>, text: impl Into<String>) -> Self {
        let severity = match kind {
            ReminderKind::DoseTaken => Severity::Info,
            ReminderKind::RefillNeeded => Severity::Warning,
            ReminderKind::ReturnBottle => Severity::Critical,
        };
        Self {
            id: NotificationId::new(),
            kind,
            severity,
            device_id: device_id.into(),
            slot: None,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_slot(mut self, slot: u8) -> Self {
        self.slot = Some(slot);
        self
    }

    /// One-line form for logs and the console channel.
    pub fn summary(&self) -> String {
        match self.slot {
            Some(slot) => format!(
                "[{}] {} slot {}: {}",
                self.severity, self.device_id, slot, self.text
            ),
            None => format!("[{}] {}: {}", self.severity, self.device_id, self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_follows_kind() {
        let n = Notification::new(ReminderKind::DoseTaken, "pb-1", "Nice");
        assert_eq!(n.severity, Severity::Info);
        let n = Notification::new(ReminderKind::ReturnBottle, "pb-1", "Return it");
        assert_eq!(n.severity, Severity::Critical);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_summary() {
        let n = Notification::new(ReminderKind::RefillNeeded, "pb-1", "Running low").with_slot(2);
        assert_eq!(n.summary(), "[warning] pb-1 slot 2: Running low");
    }

    #[test]
    fn test_serialized_severity_is_lowercase() {
        let n = Notification::new(ReminderKind::RefillNeeded, "pb-1", "x");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["kind"], "refill_needed");
        assert!(json.get("slot").is_none());
    }

    #[test]
    fn test_notification_json_reads_back() {
        let n = Notification::new(ReminderKind::ReturnBottle, "pb-1", "Return it").with_slot(3);
        let json = serde_json::to_string(&n).unwrap();
        let back: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(back.severity, Severity::Critical);
        assert_eq!(back.slot, Some(3));

        let bad = json.replace("\"critical\"", "\"loud\"");
        assert!(serde_json::from_str::<Notification>(&bad).is_err());
    }
}
