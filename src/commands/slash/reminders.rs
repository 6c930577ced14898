//! Reminder slash commands

use serenity::builder::CreateApplicationCommand;

/// Creates the everyday reminder commands
pub fn create_commands() -> Vec<CreateApplicationCommand> {
    vec![
        simple("start", "Turn reminders on and show the main actions"),
        simple("add", "Create a new medicine reminder"),
        simple("list", "Show your reminders"),
        simple("stop", "Pause all reminders (they are kept)"),
    ]
}

fn simple(name: &str, description: &str) -> CreateApplicationCommand {
    CreateApplicationCommand::default()
        .name(name)
        .description(description)
        .dm_permission(true)
        .to_owned()
}
