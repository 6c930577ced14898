//! Runs dialog transitions against the repository and the notifier

use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::Arc;

use super::prompts;
use super::state::{transition, DialogInput, DialogState, Effect};
use super::store::DialogStore;
use crate::features::reminders::{ChatId, NewReminder, ReminderRepository};
use crate::notifier::{MessageId, Notifier};

pub struct DialogManager {
    store: DialogStore,
    repository: Arc<dyn ReminderRepository>,
    notifier: Arc<dyn Notifier>,
    zone: String,
}

impl DialogManager {
    pub fn new(
        repository: Arc<dyn ReminderRepository>,
        notifier: Arc<dyn Notifier>,
        zone: impl Into<String>,
    ) -> Self {
        Self {
            store: DialogStore::new(),
            repository,
            notifier,
            zone: zone.into(),
        }
    }

    pub fn state(&self, chat_id: ChatId) -> Option<DialogState> {
        self.store.state(chat_id)
    }

    pub fn is_pending(&self, chat_id: ChatId) -> bool {
        self.store.state(chat_id).is_some()
    }

    /// Start a fresh dialog, replacing any pending one
    pub async fn begin(&self, chat_id: ChatId) -> Result<()> {
        let dialog_id = self.store.next_dialog_id();
        info!("📝 Reminder dialog {dialog_id} started for {chat_id}");
        self.step(chat_id, DialogInput::Begin { dialog_id }, None).await?;
        debug!("📝 {} dialogs pending", self.store.len());
        Ok(())
    }

    /// Free text typed by the user
    pub async fn handle_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.step(chat_id, DialogInput::Text(text.to_string()), None)
            .await
    }

    /// A control pressed on message `origin`
    pub async fn handle_input(&self, chat_id: ChatId, input: DialogInput, origin: MessageId) -> Result<()> {
        self.step(chat_id, input, Some(origin)).await
    }

    /// Discard the pending dialog and its prompt, if any
    ///
    /// Commands call this before running so a command always wins over a dialog.
    pub async fn abort(&self, chat_id: ChatId) -> bool {
        let Some(pending) = self.store.clear(chat_id) else {
            return false;
        };
        debug!("Dialog {} of {} discarded in {:?}", pending.dialog_id, chat_id, pending.state);
        if let Some(message_id) = pending.message_id {
            if let Err(e) = self.notifier.delete_message(chat_id, message_id).await {
                warn!("Failed to delete abandoned prompt for {chat_id}: {e}");
            }
        }
        true
    }

    async fn step(&self, chat_id: ChatId, input: DialogInput, origin: Option<MessageId>) -> Result<()> {
        let zone = self.zone.as_str();
        let (effects, pending) = self
            .store
            .apply(chat_id, |current| transition(current, input, origin, zone));
        self.execute(chat_id, pending, effects).await
    }

    async fn execute(&self, chat_id: ChatId, dialog_id: Option<u64>, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::Prompt { text, controls } => {
                    let message_id = self
                        .notifier
                        .send_with_controls(chat_id, &text, &controls)
                        .await?;
                    if let Some(dialog_id) = dialog_id {
                        self.store.attach_message(chat_id, dialog_id, message_id);
                    }
                }
                Effect::EditPrompt {
                    message_id,
                    text,
                    controls,
                } => {
                    self.notifier
                        .edit_text(chat_id, message_id, &text, Some(&controls))
                        .await?;
                }
                Effect::DeleteMessage(message_id) => {
                    if let Err(e) = self.notifier.delete_message(chat_id, message_id).await {
                        warn!("Failed to delete prompt {message_id} for {chat_id}: {e}");
                    }
                }
                Effect::Notify(text) => {
                    self.notifier.send_text(chat_id, &text).await?;
                }
                Effect::Complete {
                    draft,
                    prompt_message,
                } => self.complete(chat_id, draft, prompt_message).await?,
            }
        }
        Ok(())
    }

    async fn complete(&self, chat_id: ChatId, draft: NewReminder, prompt_message: Option<MessageId>) -> Result<()> {
        if let Some(message_id) = prompt_message {
            if let Err(e) = self.notifier.delete_message(chat_id, message_id).await {
                warn!("Failed to delete course prompt for {chat_id}: {e}");
            }
        }

        let saved = match self.repository.add_reminder(chat_id, &draft).await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to save reminder for {chat_id}: {e}");
                self.notifier.send_text(chat_id, prompts::SAVE_FAILED).await?;
                return Ok(());
            }
        };

        if let Err(e) = self.repository.set_active(chat_id, true).await {
            error!("Failed to activate {chat_id} after adding a reminder: {e}");
        }

        info!(
            "💊 Reminder {} saved for {}: {} at {:02}:{:02}, {} days",
            saved, chat_id, draft.medicine, draft.hour, draft.minute, draft.course_days
        );
        self.notifier
            .send_text(chat_id, &prompts::saved(&draft, &self.zone))
            .await?;
        Ok(())
    }
}
