//! # Reminders Feature
//!
//! Recurring medicine reminders: the domain model, the storage contract, the
//! engine that counts doses, and the quarter-hour scheduler that delivers them.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Time-of-day reminders with courses, repository trait and engine
//! - 1.0.0: Initial release with one-shot reminders

pub mod engine;
pub mod model;
pub mod repository;
pub mod scheduler;

pub use engine::{Acknowledgement, ReminderEngine};
pub use model::{
    course_label, progress_label, ChatId, CountingMode, DoseOutcome, NewReminder, Reminder,
    ReminderId, Slot, Stats, User, CUSTOM_COURSE_RANGE, PRESET_COURSES, QUARTER_MARKS,
};
pub use repository::ReminderRepository;
pub use scheduler::{DeliveryReport, ReminderScheduler, SchedulerHandle, TickOutcome};
