//! # Command System
//!
//! User commands arrive either as Discord slash commands or as `/command` text in
//! a DM. Both are turned into a [`Command`] and run by the [`CommandHandler`].
//!
//! - **Version**: 3.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 3.0.0: Reminder command set, shared parsing for slash and DM text commands
//! - 2.0.0: Remove bang commands, slash-only command system
//! - 1.0.0: Initial reorganization with modular command structure

pub mod slash;

pub use crate::command_handler::CommandHandler;

pub use slash::{
    create_slash_commands, get_string_option, register_global_commands, register_guild_commands,
};

use crate::message_components::MenuAction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Add,
    List,
    Stop,
    Stats,
    /// Admin broadcast of the given text
    Notify(String),
    Unknown(String),
}

impl Command {
    /// Resolve a command by name; `argument` is the rest of the input
    pub fn from_name(name: &str, argument: &str) -> Self {
        match name.to_lowercase().as_str() {
            "start" => Command::Start,
            "add" => Command::Add,
            "list" => Command::List,
            "stop" => Command::Stop,
            "stats" => Command::Stats,
            "notify" => Command::Notify(argument.trim().to_string()),
            other => Command::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Command::Start => "start",
            Command::Add => "add",
            Command::List => "list",
            Command::Stop => "stop",
            Command::Stats => "stats",
            Command::Notify(_) => "notify",
            Command::Unknown(name) => name,
        }
    }
}

impl From<MenuAction> for Command {
    fn from(action: MenuAction) -> Self {
        match action {
            MenuAction::Add => Command::Add,
            MenuAction::List => Command::List,
            MenuAction::Stop => Command::Stop,
            MenuAction::Start => Command::Start,
        }
    }
}

/// Parse a DM text such as `/add` or `/notify hello everyone`
///
/// Returns None for text that is not a command.
pub fn parse_text_command(text: &str) -> Option<Command> {
    let body = text.trim().strip_prefix('/')?;
    let (name, argument) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest),
        None => (body, ""),
    };
    if name.is_empty() {
        return None;
    }
    // `/add@BotName` style suffixes
    let name = name.split('@').next().unwrap_or(name);
    Some(Command::from_name(name, argument))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_command() {
        assert_eq!(parse_text_command("/add"), Some(Command::Add));
        assert_eq!(parse_text_command("  /LIST "), Some(Command::List));
        assert_eq!(
            parse_text_command("/notify  Pills at nine "),
            Some(Command::Notify("Pills at nine".to_string()))
        );
        assert_eq!(parse_text_command("/start@pillbox"), Some(Command::Start));
        assert_eq!(
            parse_text_command("/dance"),
            Some(Command::Unknown("dance".to_string()))
        );
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse_text_command("Aspirin"), None);
        assert_eq!(parse_text_command("/"), None);
        assert_eq!(parse_text_command("/ add"), None);
    }

    #[test]
    fn test_menu_actions_map_to_commands() {
        assert_eq!(Command::from(MenuAction::List), Command::List);
        assert_eq!(Command::from(MenuAction::Stop).name(), "stop");
    }
}
