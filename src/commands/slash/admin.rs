//! Admin slash commands

use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;

/// Creates admin commands; access is checked when they run
pub fn create_commands() -> Vec<CreateApplicationCommand> {
    vec![create_stats_command(), create_notify_command()]
}

fn create_stats_command() -> CreateApplicationCommand {
    CreateApplicationCommand::default()
        .name("stats")
        .description("Show bot statistics (admin only)")
        .dm_permission(true)
        .to_owned()
}

fn create_notify_command() -> CreateApplicationCommand {
    CreateApplicationCommand::default()
        .name("notify")
        .description("Send a message to every user (admin only)")
        .dm_permission(true)
        .create_option(|option| {
            option
                .name("message")
                .description("Text to broadcast")
                .kind(CommandOptionType::String)
                .required(true)
        })
        .to_owned()
}
