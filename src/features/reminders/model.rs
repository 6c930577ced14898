//! Reminder domain types
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Add CountingMode for delivery vs acknowledgement dose counting
//! - 1.0.0: Initial release with Reminder, User, Slot and Stats

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform-assigned recipient id (Discord user id)
pub type ChatId = i64;
/// Reminder row id, unique within its owner
pub type ReminderId = i64;

/// Minutes a reminder may be scheduled on
pub const QUARTER_MARKS: [u8; 4] = [0, 15, 30, 45];
/// Preset course lengths offered by the dialog (0 = unbounded)
pub const PRESET_COURSES: [u32; 7] = [7, 14, 21, 30, 60, 90, 0];
/// Accepted range for a custom course length
pub const CUSTOM_COURSE_RANGE: std::ops::RangeInclusive<u32> = 1..=365;

/// A scheduled medicine notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub medicine: String,
    pub hour: u8,
    pub minute: u8,
    /// Course length in days, 0 for an unbounded course
    pub course_days: u32,
    pub doses_taken: u32,
}

impl Reminder {
    pub fn time_label(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }

    pub fn progress_label(&self) -> String {
        progress_label(self.doses_taken, self.course_days)
    }

    pub fn is_completed(&self) -> bool {
        self.course_days > 0 && self.doses_taken >= self.course_days
    }

    pub fn slot(&self) -> Option<Slot> {
        Slot::new(self.hour, self.minute)
    }
}

/// Format dose progress as `count/total`, or `count/∞` for unbounded courses
pub fn progress_label(count: u32, total: u32) -> String {
    if total == 0 {
        format!("{count}/∞")
    } else {
        format!("{count}/{total}")
    }
}

/// Human label for a course length
pub fn course_label(days: u32) -> String {
    match days {
        0 => "♾ Unbounded".to_string(),
        1 => "1 day".to_string(),
        n => format!("{n} days"),
    }
}

/// Fields of a reminder that the dialog collects before it is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReminder {
    pub medicine: String,
    pub hour: u8,
    pub minute: u8,
    pub course_days: u32,
}

/// A user and their reminder schedule state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub chat_id: ChatId,
    pub active: bool,
    pub reminders: Vec<Reminder>,
}

/// One quarter-hour mark of the day, the unit of scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot {
    pub hour: u8,
    pub minute: u8,
}

impl Slot {
    /// Returns None unless `hour:minute` is a valid quarter-hour mark
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && QUARTER_MARKS.contains(&minute) {
            Some(Slot { hour, minute })
        } else {
            None
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Result of recording one dose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoseOutcome {
    pub medicine: String,
    pub count: u32,
    pub total: u32,
    /// The course finished with this dose and the reminder was removed
    pub completed: bool,
}

impl DoseOutcome {
    pub fn progress_label(&self) -> String {
        progress_label(self.count, self.total)
    }
}

/// Aggregate counts for the admin stats command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_users: u64,
    pub active_users: u64,
    pub total_reminders: u64,
    pub finite_courses: u64,
    pub unbounded_courses: u64,
    pub doses_taken: u64,
    pub doses_planned: u64,
}

/// Who advances a reminder's course
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CountingMode {
    /// The scheduler counts a dose once the reminder was delivered
    #[default]
    Delivery,
    /// Only the user's "taken" acknowledgement counts a dose
    Acknowledgement,
}

impl fmt::Display for CountingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountingMode::Delivery => write!(f, "delivery"),
            CountingMode::Acknowledgement => write!(f, "acknowledgement"),
        }
    }
}

impl std::str::FromStr for CountingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "delivery" => Ok(CountingMode::Delivery),
            "acknowledgement" | "acknowledgment" | "ack" => Ok(CountingMode::Acknowledgement),
            _ => Err(anyhow::anyhow!("Invalid dose counting mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reminder(course_days: u32, doses_taken: u32) -> Reminder {
        Reminder {
            id: 1,
            medicine: "Aspirin".to_string(),
            hour: 9,
            minute: 5,
            course_days,
            doses_taken,
        }
    }

    #[test]
    fn test_progress_label() {
        assert_eq!(progress_label(3, 7), "3/7");
        assert_eq!(progress_label(12, 0), "12/∞");
    }

    #[test]
    fn test_completion() {
        assert!(!reminder(7, 6).is_completed());
        assert!(reminder(7, 7).is_completed());
        assert!(!reminder(0, 500).is_completed());
    }

    #[test]
    fn test_slot_accepts_only_quarter_marks() {
        assert!(Slot::new(9, 15).is_some());
        assert!(Slot::new(23, 45).is_some());
        assert!(Slot::new(9, 16).is_none());
        assert!(Slot::new(24, 0).is_none());
        assert_eq!(Slot::new(7, 0).unwrap().to_string(), "07:00");
        assert_eq!(reminder(0, 0).time_label(), "09:05");
    }

    #[test]
    fn test_counting_mode_parse() {
        assert_eq!("delivery".parse::<CountingMode>().unwrap(), CountingMode::Delivery);
        assert_eq!("ACK".parse::<CountingMode>().unwrap(), CountingMode::Acknowledgement);
        assert!("sometimes".parse::<CountingMode>().is_err());
        assert_eq!(CountingMode::default(), CountingMode::Delivery);
    }

    #[test]
    fn test_course_label() {
        assert_eq!(course_label(0), "♾ Unbounded");
        assert_eq!(course_label(1), "1 day");
        assert_eq!(course_label(14), "14 days");
    }
}
