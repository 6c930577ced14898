//! Storage contract consumed by the reminder core
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

use super::model::{ChatId, DoseOutcome, NewReminder, Reminder, ReminderId, Stats, User};

/// Durable store of users and their reminders
///
/// Every method fails with an error when the backend is unavailable. Callers on
/// interactive paths surface that as a generic "try again" message; the
/// scheduler retries on its next cycle.
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Fetch a user, creating an active one on first contact
    async fn get_or_create_user(&self, chat_id: ChatId) -> Result<User>;

    async fn set_active(&self, chat_id: ChatId, active: bool) -> Result<()>;

    /// All reminders of a user ordered by time of day
    async fn list_reminders(&self, chat_id: ChatId) -> Result<Vec<Reminder>>;

    async fn add_reminder(&self, chat_id: ChatId, reminder: &NewReminder) -> Result<ReminderId>;

    /// Returns true when a reminder owned by `chat_id` was removed
    async fn delete_reminder(&self, chat_id: ChatId, reminder_id: ReminderId) -> Result<bool>;

    /// Reminders of active users scheduled at `hour:minute` whose course is not complete
    async fn due_reminders(&self, hour: u8, minute: u8) -> Result<BTreeMap<ChatId, Vec<Reminder>>>;

    /// Atomically count one dose, deleting the reminder when its course completes
    ///
    /// Returns `Ok(None)` when the reminder no longer exists.
    async fn increment_dose(
        &self,
        chat_id: ChatId,
        reminder_id: ReminderId,
    ) -> Result<Option<DoseOutcome>>;

    async fn stats(&self) -> Result<Stats>;

    async fn list_user_ids(&self) -> Result<Vec<ChatId>>;
}

