//! Reminder text.
//!
//! All user-facing sentences live here so the state machine and the
//! scanner only decide *when* to speak.

/// Name used when a prescription has none.
pub const DEFAULT_MEDICATION_NAME: &str = "medication";

fn name_or_default(name: &str) -> &str {
    if name.trim().is_empty() {
        DEFAULT_MEDICATION_NAME
    } else {
        name
    }
}

/// Congratulation after a dose.
///
/// Both the variant and the quoted count use the count *before* the decrement.
pub fn dose_taken(name: &str, count_before: u32) -> String {
    let name = name_or_default(name);
    match count_before % 4 {
        0 => format!("Great job! You took your {}. Keep up the good work!", name),
        1 => format!(
            "Well done! Your {} has been taken. You have {} pills remaining.",
            name, count_before
        ),
        2 => format!("Excellent! You're staying on track with your {}.", name),
        _ => format!("Nice work! You took your {}. Stay healthy!", name),
    }
}

/// Low-stock reminder. Without refills the bottle should be thrown away.
pub fn refill_needed(name: &str, remaining: u32, has_refills: bool) -> String {
    let name = name_or_default(name);
    if has_refills {
        format!(
            "Your {} is running low with {} pills remaining. Please get a refill soon.",
            name, remaining
        )
    } else {
        format!(
            "Your {} is running low with {} pills remaining. Please dispose of the empty bottle.",
            name, remaining
        )
    }
}

/// Bottle left out past the timeout.
pub fn return_bottle(name: &str, slot: u8) -> String {
    format!(
        "Reminder: Please return your {} bottle to slot {} of your PillBuddy.",
        name_or_default(name),
        slot
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dose_taken_rotation() {
        assert!(dose_taken("Aspirin", 8).starts_with("Great job!"));
        assert!(dose_taken("Aspirin", 6).starts_with("Excellent!"));
        assert!(dose_taken("Aspirin", 7).starts_with("Nice work!"));
    }

    #[test]
    fn test_dose_taken_quotes_count_before_decrement() {
        assert_eq!(
            dose_taken("Aspirin", 5),
            "Well done! Your Aspirin has been taken. You have 5 pills remaining."
        );
        assert_eq!(
            dose_taken("", 1),
            "Well done! Your medication has been taken. You have 1 pills remaining."
        );
    }

    #[test]
    fn test_refill_wording_by_refills() {
        assert!(refill_needed("Aspirin", 4, true).ends_with("Please get a refill soon."));
        assert!(refill_needed("Aspirin", 4, false).ends_with("Please dispose of the empty bottle."));
        assert!(refill_needed("Aspirin", 4, true).contains("with 4 pills"));
    }

    #[test]
    fn test_missing_name_defaults() {
        assert_eq!(
            return_bottle("", 2),
            "Reminder: Please return your medication bottle to slot 2 of your PillBuddy."
        );
    }
}
