//! Reminder kinds.

use serde::{Deserialize, Serialize};

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// A bottle was lifted and a dose counted.
    DoseTaken,
    /// Stock dropped below the refill threshold.
    RefillNeeded,
    /// A bottle has been out of its slot too long.
    ReturnBottle,
}

impl ReminderKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::DoseTaken => "dose_taken",
            Self::RefillNeeded => "refill_needed",
            Self::ReturnBottle => "return_bottle",
        }
    }
}

impl std::fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
