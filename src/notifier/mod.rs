//! # Notifier
//!
//! Outbound messaging as the reminder core sees it: plain text, text with
//! interactive controls, in-place edits and deletes. The Discord transport lives in
//! [`discord`]; tests use a recording double.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Pickers (select menus) alongside button rows
//! - 1.0.0: Initial release with send, edit and delete

pub mod discord;

#[cfg(test)]
pub mod recording;

use anyhow::Result;
use async_trait::async_trait;

use crate::features::reminders::{ChatId, ReminderId};
use crate::message_components::ComponentAction;

pub use discord::DiscordNotifier;

/// Platform message id, used to edit or delete a prompt later
pub type MessageId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonTone {
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ComponentAction,
    pub tone: ButtonTone,
}

impl Button {
    pub fn new(label: impl Into<String>, action: ComponentAction, tone: ButtonTone) -> Self {
        Self {
            label: label.into(),
            action,
            tone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOption {
    pub label: String,
    pub action: ComponentAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRow {
    Buttons(Vec<Button>),
    /// A single-choice dropdown; `id` must be unique within the message
    Picker {
        id: String,
        placeholder: String,
        options: Vec<PickerOption>,
    },
}

/// Interactive controls attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Controls {
    pub rows: Vec<ControlRow>,
}

impl Controls {
    pub fn new(rows: Vec<ControlRow>) -> Self {
        Self { rows }
    }

    /// A single row holding just a cancel button
    pub fn cancel_only() -> Self {
        Self::new(vec![ControlRow::Buttons(vec![Button::new(
            "❌ Cancel",
            ComponentAction::Cancel,
            ButtonTone::Secondary,
        )])])
    }

    /// The "taken" acknowledgement attached to a delivered reminder
    pub fn taken(reminder_id: ReminderId) -> Self {
        Self::new(vec![ControlRow::Buttons(vec![Button::new(
            "✅ Taken",
            ComponentAction::Taken(reminder_id),
            ButtonTone::Success,
        )])])
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every action reachable from these controls
    pub fn actions(&self) -> Vec<ComponentAction> {
        self.rows
            .iter()
            .flat_map(|row| match row {
                ControlRow::Buttons(buttons) => {
                    buttons.iter().map(|b| b.action.clone()).collect::<Vec<_>>()
                }
                ControlRow::Picker { options, .. } => {
                    options.iter().map(|o| o.action.clone()).collect()
                }
            })
            .collect()
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId>;

    async fn send_with_controls(
        &self,
        chat_id: ChatId,
        text: &str,
        controls: &Controls,
    ) -> Result<MessageId>;

    /// Send a delivered reminder with its acknowledgement control bound to `reminder_id`
    async fn send_with_ack_control(
        &self,
        chat_id: ChatId,
        text: &str,
        reminder_id: ReminderId,
    ) -> Result<MessageId> {
        self.send_with_controls(chat_id, text, &Controls::taken(reminder_id))
            .await
    }

    /// Replace a message's text; `None` strips its controls
    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        controls: Option<&Controls>,
    ) -> Result<()>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()>;
}
