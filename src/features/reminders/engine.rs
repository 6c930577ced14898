//! # Reminder Engine
//!
//! Logic over reminder entities on top of a [`ReminderRepository`]: selection of
//! due reminders, dose counting and the texts shown around a delivered dose.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Acknowledgement handling for both counting modes
//! - 1.0.0: Initial release with due selection and dose increment

use anyhow::Result;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::model::{ChatId, CountingMode, DoseOutcome, Reminder, ReminderId, Slot};
use super::repository::ReminderRepository;

/// What a "taken" press amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    /// The press counted a dose
    Counted(DoseOutcome),
    /// The dose was already counted at delivery; the reminder is still running
    Noted(Reminder),
    /// The reminder no longer exists (deleted, or its course completed)
    Gone,
}

#[derive(Clone)]
pub struct ReminderEngine {
    repository: Arc<dyn ReminderRepository>,
    counting: CountingMode,
}

impl ReminderEngine {
    pub fn new(repository: Arc<dyn ReminderRepository>, counting: CountingMode) -> Self {
        Self {
            repository,
            counting,
        }
    }

    pub fn counting_mode(&self) -> CountingMode {
        self.counting
    }

    /// Whether the scheduler advances the course after a successful delivery
    pub fn counts_on_delivery(&self) -> bool {
        self.counting == CountingMode::Delivery
    }

    /// Reminders due at `slot`, grouped by owner, each list ordered by id
    ///
    /// The repository already filters inactive owners and completed courses; the
    /// result is re-checked here so a lax backend cannot leak a finished course.
    pub async fn due_reminders(&self, slot: Slot) -> Result<BTreeMap<ChatId, Vec<Reminder>>> {
        let mut due = self.repository.due_reminders(slot.hour, slot.minute).await?;
        for reminders in due.values_mut() {
            reminders.retain(|r| !r.is_completed() && r.slot() == Some(slot));
            reminders.sort_by_key(|r| r.id);
        }
        due.retain(|_, reminders| !reminders.is_empty());
        Ok(due)
    }

    /// Count one dose; `None` when the reminder is already gone
    pub async fn increment_dose(
        &self,
        chat_id: ChatId,
        reminder_id: ReminderId,
    ) -> Result<Option<DoseOutcome>> {
        let outcome = self.repository.increment_dose(chat_id, reminder_id).await?;
        match &outcome {
            Some(o) => debug!(
                "Dose {} for reminder {} of {} (completed: {})",
                o.progress_label(),
                reminder_id,
                chat_id,
                o.completed
            ),
            None => debug!("Reminder {reminder_id} of {chat_id} is gone, nothing counted"),
        }
        Ok(outcome)
    }

    /// Handle a "taken" press on a delivered reminder
    pub async fn acknowledge(
        &self,
        chat_id: ChatId,
        reminder_id: ReminderId,
    ) -> Result<Acknowledgement> {
        match self.counting {
            CountingMode::Acknowledgement => Ok(self
                .increment_dose(chat_id, reminder_id)
                .await?
                .map(Acknowledgement::Counted)
                .unwrap_or(Acknowledgement::Gone)),
            CountingMode::Delivery => {
                let reminders = self.repository.list_reminders(chat_id).await?;
                Ok(reminders
                    .into_iter()
                    .find(|r| r.id == reminder_id)
                    .map(Acknowledgement::Noted)
                    .unwrap_or(Acknowledgement::Gone))
            }
        }
    }
}

/// Text of a delivered reminder
pub fn delivery_text(reminder: &Reminder) -> String {
    format!("⏰ Time to take: 💊 {}", reminder.medicine)
}

/// Text a delivered reminder is edited to once acknowledged
pub fn taken_text(medicine: &str, progress: &str) -> String {
    format!("✅ Taken: 💊 {medicine}\n📊 Dose: {progress}")
}

pub fn congratulation_text(medicine: &str) -> String {
    format!("🎉 Course \"{medicine}\" complete! Well done!")
}
