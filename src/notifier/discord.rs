//! # Discord notifier
//!
//! Delivers messages to a user's DM channel through serenity's HTTP client.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Render pickers as select menus, cache DM channel ids
//! - 1.0.0: Initial release with chunked sends and button rows

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, warn};
use serenity::builder::CreateComponents;
use serenity::http::Http;
use serenity::model::application::component::ButtonStyle;
use serenity::model::id::{ChannelId, MessageId as DiscordMessageId, UserId};
use std::sync::Arc;

use super::{ButtonTone, ControlRow, Controls, MessageId, Notifier};
use crate::core::{chunk_for_message, truncate_label};
use crate::features::reminders::ChatId;

/// Discord allows at most 5 action rows per message
const MAX_ROWS: usize = 5;
/// and at most 5 buttons per row
const MAX_BUTTONS_PER_ROW: usize = 5;
/// Select menus carry at most 25 options
const MAX_PICKER_OPTIONS: usize = 25;

pub struct DiscordNotifier {
    http: Arc<Http>,
    dm_channels: DashMap<ChatId, ChannelId>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            dm_channels: DashMap::new(),
        }
    }

    async fn dm_channel(&self, chat_id: ChatId) -> Result<ChannelId> {
        if let Some(channel) = self.dm_channels.get(&chat_id) {
            return Ok(*channel);
        }
        let channel = UserId(chat_id as u64).create_dm_channel(&self.http).await?;
        self.dm_channels.insert(chat_id, channel.id);
        debug!("Opened DM channel {} for {}", channel.id, chat_id);
        Ok(channel.id)
    }

    async fn send(&self, chat_id: ChatId, text: &str, controls: Option<&Controls>) -> Result<MessageId> {
        let channel = self.dm_channel(chat_id).await?;
        let chunks = chunk_for_message(text);
        let last = chunks.len().saturating_sub(1);

        let mut message_id = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            let attach = if i == last { controls } else { None };
            let message = channel
                .send_message(&self.http, |m| {
                    m.content(chunk);
                    if let Some(controls) = attach {
                        m.components(|c| render(c, controls));
                    }
                    m
                })
                .await?;
            message_id = message.id.0;
        }
        Ok(message_id)
    }
}

/// Build serenity action rows for `controls`, dropping whatever exceeds Discord's limits
fn render<'a>(components: &'a mut CreateComponents, controls: &Controls) -> &'a mut CreateComponents {
    if controls.rows.len() > MAX_ROWS {
        warn!("Dropping {} control rows over the limit", controls.rows.len() - MAX_ROWS);
    }

    for row in controls.rows.iter().take(MAX_ROWS) {
        match row {
            ControlRow::Buttons(buttons) => {
                if buttons.len() > MAX_BUTTONS_PER_ROW {
                    warn!("Dropping {} buttons over the row limit", buttons.len() - MAX_BUTTONS_PER_ROW);
                }
                components.create_action_row(|r| {
                    for button in buttons.iter().take(MAX_BUTTONS_PER_ROW) {
                        r.create_button(|b| {
                            b.custom_id(button.action.custom_id())
                                .label(truncate_label(&button.label))
                                .style(style(button.tone))
                        });
                    }
                    r
                });
            }
            ControlRow::Picker {
                id,
                placeholder,
                options,
            } => {
                components.create_action_row(|r| {
                    r.create_select_menu(|menu| {
                        menu.custom_id(id)
                            .placeholder(placeholder)
                            .options(|opts| {
                                for option in options.iter().take(MAX_PICKER_OPTIONS) {
                                    opts.create_option(|o| {
                                        o.label(truncate_label(&option.label))
                                            .value(option.action.custom_id())
                                    });
                                }
                                opts
                            })
                    })
                });
            }
        }
    }
    components
}

fn style(tone: ButtonTone) -> ButtonStyle {
    match tone {
        ButtonTone::Primary => ButtonStyle::Primary,
        ButtonTone::Secondary => ButtonStyle::Secondary,
        ButtonTone::Success => ButtonStyle::Success,
        ButtonTone::Danger => ButtonStyle::Danger,
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId> {
        self.send(chat_id, text, None).await
    }

    async fn send_with_controls(
        &self,
        chat_id: ChatId,
        text: &str,
        controls: &Controls,
    ) -> Result<MessageId> {
        self.send(chat_id, text, Some(controls)).await
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        controls: Option<&Controls>,
    ) -> Result<()> {
        let channel = self.dm_channel(chat_id).await?;
        // An edit cannot grow into several messages, keep the first chunk
        let content = chunk_for_message(text).into_iter().next().unwrap_or_default();
        channel
            .edit_message(&self.http, DiscordMessageId(message_id), |m| {
                m.content(content).components(|c| match controls {
                    Some(controls) => render(c, controls),
                    None => c,
                })
            })
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        let channel = self.dm_channel(chat_id).await?;
        channel
            .delete_message(&self.http, DiscordMessageId(message_id))
            .await?;
        Ok(())
    }
}
