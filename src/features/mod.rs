//! # Features
//!
//! - **reminders**: reminder model, storage contract, dose engine and the quarter-hour scheduler
//! - **dialog**: the multi-step "add reminder" conversation
//! - **rate_limiting**: per-user inbound event limiter
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: Medication reminders with dialog-driven creation
//! - 1.0.0: Initial feature layout

pub mod dialog;
pub mod rate_limiting;
pub mod reminders;

pub use dialog::DialogManager;
pub use rate_limiting::RateLimiter;
pub use reminders::{ReminderEngine, ReminderScheduler};
