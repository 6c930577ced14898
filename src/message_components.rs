//! # Message components
//!
//! Custom ids carried by buttons and select menus, and the handler that routes a
//! pressed component to the dialog, the reminder engine or a menu command.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: Typed component actions for the reminder dialog and menus
//! - 1.0.0: Initial release with persona buttons and pagination

use anyhow::Result;
use log::{info, warn};
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::prelude::Context;
use std::fmt;

use crate::commands::CommandHandler;
use crate::features::reminders::{ChatId, ReminderId, PRESET_COURSES, QUARTER_MARKS};

/// Main-menu shortcuts mirroring the slash commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Add,
    List,
    Stop,
    Start,
}

/// Everything a component can ask for, encoded in its custom id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentAction {
    /// `hour_9`
    Hour(u8),
    /// `time_9:15`
    Time { hour: u8, minute: u8 },
    /// `course_7`, `course_0` for an unbounded course
    Course(u32),
    /// `course_custom`
    CustomCourse,
    /// `del_12`
    Delete(ReminderId),
    /// `taken_12`
    Taken(ReminderId),
    Cancel,
    /// `menu_add`, `menu_list`, `menu_stop`, `menu_start`
    Menu(MenuAction),
}

impl ComponentAction {
    pub fn custom_id(&self) -> String {
        self.to_string()
    }

    /// Parse a custom id, rejecting anything out of range
    pub fn parse(custom_id: &str) -> Option<Self> {
        if custom_id == "cancel" {
            return Some(ComponentAction::Cancel);
        }
        if let Some(rest) = custom_id.strip_prefix("hour_") {
            let hour = rest.parse::<u8>().ok().filter(|h| *h < 24)?;
            return Some(ComponentAction::Hour(hour));
        }
        if let Some(rest) = custom_id.strip_prefix("time_") {
            let (h, m) = rest.split_once(':')?;
            let hour = h.parse::<u8>().ok().filter(|h| *h < 24)?;
            let minute = m.parse::<u8>().ok().filter(|m| QUARTER_MARKS.contains(m))?;
            return Some(ComponentAction::Time { hour, minute });
        }
        if let Some(rest) = custom_id.strip_prefix("course_") {
            if rest == "custom" {
                return Some(ComponentAction::CustomCourse);
            }
            let days = rest.parse::<u32>().ok().filter(|d| PRESET_COURSES.contains(d))?;
            return Some(ComponentAction::Course(days));
        }
        if let Some(rest) = custom_id.strip_prefix("del_") {
            return rest.parse::<ReminderId>().ok().map(ComponentAction::Delete);
        }
        if let Some(rest) = custom_id.strip_prefix("taken_") {
            return rest.parse::<ReminderId>().ok().map(ComponentAction::Taken);
        }
        let menu = match custom_id.strip_prefix("menu_")? {
            "add" => MenuAction::Add,
            "list" => MenuAction::List,
            "stop" => MenuAction::Stop,
            "start" => MenuAction::Start,
            _ => return None,
        };
        Some(ComponentAction::Menu(menu))
    }
}

impl fmt::Display for ComponentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentAction::Hour(hour) => write!(f, "hour_{hour}"),
            ComponentAction::Time { hour, minute } => write!(f, "time_{hour}:{minute}"),
            ComponentAction::Course(days) => write!(f, "course_{days}"),
            ComponentAction::CustomCourse => write!(f, "course_custom"),
            ComponentAction::Delete(id) => write!(f, "del_{id}"),
            ComponentAction::Taken(id) => write!(f, "taken_{id}"),
            ComponentAction::Cancel => write!(f, "cancel"),
            ComponentAction::Menu(MenuAction::Add) => write!(f, "menu_add"),
            ComponentAction::Menu(MenuAction::List) => write!(f, "menu_list"),
            ComponentAction::Menu(MenuAction::Stop) => write!(f, "menu_stop"),
            ComponentAction::Menu(MenuAction::Start) => write!(f, "menu_start"),
        }
    }
}

/// Handler for all message component interactions
pub struct MessageComponentHandler {
    command_handler: CommandHandler,
}

impl MessageComponentHandler {
    pub fn new(command_handler: CommandHandler) -> Self {
        Self { command_handler }
    }

    /// Acknowledge the interaction, then route the action it carries
    pub async fn handle_component_interaction(
        &self,
        ctx: &Context,
        interaction: &MessageComponentInteraction,
    ) -> Result<()> {
        let chat_id = interaction.user.id.0 as ChatId;
        // Select menus carry the chosen action in their value
        let raw = match interaction.data.values.first() {
            Some(value) => value.clone(),
            None => interaction.data.custom_id.clone(),
        };

        info!("Processing component interaction: {raw} from user: {chat_id}");

        interaction
            .create_interaction_response(&ctx.http, |response| {
                response.kind(InteractionResponseType::DeferredUpdateMessage)
            })
            .await?;

        match ComponentAction::parse(&raw) {
            Some(action) => {
                self.command_handler
                    .handle_component(chat_id, action, interaction.message.id.0)
                    .await
            }
            None => {
                warn!("Ignoring unknown component id {raw} from {chat_id}");
                Ok(())
            }
        }
    }
}
