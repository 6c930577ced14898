//! Recording notifier for tests

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{Controls, MessageId, Notifier};
use crate::features::reminders::ChatId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Sent {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        controls: Option<Controls>,
    },
    Edited {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        controls: Option<Controls>,
    },
    Deleted {
        chat_id: ChatId,
        message_id: MessageId,
    },
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Recorded>>,
    next_id: AtomicU64,
    failing: DashSet<ChatId>,
    hanging: DashSet<ChatId>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call for `chat_id` fails from now on
    pub fn fail_for(&self, chat_id: ChatId) {
        self.failing.insert(chat_id);
    }

    /// Every send to `chat_id` blocks for a minute
    pub fn hang_for(&self, chat_id: ChatId) {
        self.hanging.insert(chat_id);
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Texts of messages sent to `chat_id`, oldest first
    pub fn sent_texts(&self, chat_id: ChatId) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Sent { chat_id: c, text, .. } if c == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    /// The latest message sent to `chat_id` with its id and controls
    pub fn last_sent(&self, chat_id: ChatId) -> Option<(MessageId, String, Option<Controls>)> {
        self.events().into_iter().rev().find_map(|e| match e {
            Recorded::Sent {
                chat_id: c,
                message_id,
                text,
                controls,
            } if c == chat_id => Some((message_id, text, controls)),
            _ => None,
        })
    }

    pub fn deleted(&self, chat_id: ChatId) -> Vec<MessageId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Deleted { chat_id: c, message_id } if c == chat_id => Some(message_id),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self, chat_id: ChatId) -> Vec<(MessageId, String, Option<Controls>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Edited {
                    chat_id: c,
                    message_id,
                    text,
                    controls,
                } if c == chat_id => Some((message_id, text, controls)),
                _ => None,
            })
            .collect()
    }

    async fn gate(&self, chat_id: ChatId) -> Result<()> {
        if self.hanging.contains(&chat_id) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if self.failing.contains(&chat_id) {
            anyhow::bail!("simulated delivery failure for {chat_id}");
        }
        Ok(())
    }

    fn record_send(&self, chat_id: ChatId, text: &str, controls: Option<&Controls>) -> MessageId {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.lock().unwrap().push(Recorded::Sent {
            chat_id,
            message_id,
            text: text.to_string(),
            controls: controls.cloned(),
        });
        message_id
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId> {
        self.gate(chat_id).await?;
        Ok(self.record_send(chat_id, text, None))
    }

    async fn send_with_controls(
        &self,
        chat_id: ChatId,
        text: &str,
        controls: &Controls,
    ) -> Result<MessageId> {
        self.gate(chat_id).await?;
        Ok(self.record_send(chat_id, text, Some(controls)))
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        controls: Option<&Controls>,
    ) -> Result<()> {
        self.gate(chat_id).await?;
        self.events.lock().unwrap().push(Recorded::Edited {
            chat_id,
            message_id,
            text: text.to_string(),
            controls: controls.cloned(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        self.gate(chat_id).await?;
        self.events
            .lock()
            .unwrap()
            .push(Recorded::Deleted { chat_id, message_id });
        Ok(())
    }
}
