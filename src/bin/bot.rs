use anyhow::Result;
use dotenvy::dotenv;
use log::{debug, error, info, warn};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::prelude::*;
use std::sync::Arc;

use pillbox::command_handler::HandlerSettings;
use pillbox::commands::{
    get_string_option, register_global_commands, register_guild_commands, Command, CommandHandler,
};
use pillbox::core::{offset_label, Config};
use pillbox::database::Database;
use pillbox::features::reminders::{ChatId, ReminderEngine, ReminderRepository, ReminderScheduler};
use pillbox::message_components::MessageComponentHandler;
use pillbox::notifier::{DiscordNotifier, Notifier};
use pillbox::web::{self, CompanionState};

struct Handler {
    command_handler: Arc<CommandHandler>,
    component_handler: Arc<MessageComponentHandler>,
    guild_id: Option<GuildId>,
}

impl Handler {
    fn new(
        command_handler: CommandHandler,
        component_handler: MessageComponentHandler,
        guild_id: Option<GuildId>,
    ) -> Self {
        Handler {
            command_handler: Arc::new(command_handler),
            component_handler: Arc::new(component_handler),
            guild_id,
        }
    }

    /// Acknowledge privately, run the command, then clear the placeholder
    ///
    /// Every answer is delivered by DM, so in a DM the placeholder is simply
    /// removed and in a guild it points the user to their DMs.
    async fn handle_slash_command(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        command
            .create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::DeferredChannelMessageWithSource)
                    .interaction_response_data(|message| message.ephemeral(true))
            })
            .await?;

        let chat_id = command.user.id.0 as ChatId;
        let argument = get_string_option(&command.data.options, "message").unwrap_or_default();
        let parsed = Command::from_name(&command.data.name, &argument);
        self.command_handler.handle_command(chat_id, parsed).await?;

        if command.guild_id.is_some() {
            command
                .edit_original_interaction_response(&ctx.http, |response| {
                    response.content("📬 Check your direct messages.")
                })
                .await?;
        } else {
            command.delete_original_interaction_response(&ctx.http).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, _ctx: Context, msg: Message) {
        // Reminders are a private conversation: only direct messages count
        if msg.author.bot || msg.guild_id.is_some() {
            return;
        }

        let chat_id = msg.author.id.0 as ChatId;
        debug!("📨 DM from {} ({} chars)", chat_id, msg.content.chars().count());

        if let Err(e) = self.command_handler.handle_text(chat_id, &msg.content).await {
            error!("Error handling message from {chat_id}: {e}");
        }
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("📡 Connected to {} guilds", ready.guilds.len());
        info!("🤖 Bot ID: {}", ready.user.id);

        if let Some(shard) = ready.shard {
            info!("⚡ Shard: {}/{}", shard[0] + 1, shard[1]);
        }

        let registration = match self.guild_id {
            Some(guild_id) => {
                info!("Registering slash commands for development guild {guild_id}");
                register_guild_commands(&ctx, guild_id).await
            }
            None => {
                info!("Registering global slash commands");
                register_global_commands(&ctx).await
            }
        };
        if let Err(e) = registration {
            error!("Failed to register slash commands: {e}");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::ApplicationCommand(command) => {
                if let Err(e) = self.handle_slash_command(&ctx, &command).await {
                    error!(
                        "Error handling slash command '{}': {}",
                        command.data.name, e
                    );

                    let error_message =
                        "❌ Sorry, I encountered an error processing your command. Please try again.";

                    // The deferral may or may not have gone through
                    #[allow(clippy::redundant_pattern_matching)]
                    if let Err(_) = command
                        .edit_original_interaction_response(&ctx.http, |response| {
                            response.content(error_message)
                        })
                        .await
                    {
                        let _ = command
                            .create_interaction_response(&ctx.http, |response| {
                                response
                                    .kind(InteractionResponseType::ChannelMessageWithSource)
                                    .interaction_response_data(|message| {
                                        message.content(error_message).ephemeral(true)
                                    })
                            })
                            .await;
                    }
                }
            }
            Interaction::MessageComponent(component) => {
                if let Err(e) = self
                    .component_handler
                    .handle_component_interaction(&ctx, &component)
                    .await
                {
                    error!(
                        "Error handling component interaction '{}': {}",
                        component.data.custom_id, e
                    );
                }
            }
            _ => {
                debug!("Ignoring unsupported interaction type");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Pillbox medication reminder bot...");
    info!(
        "🕒 Schedule zone {}, dose counting on {}, polling every {:?}",
        offset_label(&config.timezone),
        config.counting_mode,
        config.poll_interval
    );
    if config.admin_user_id.is_none() {
        warn!("ADMIN_USER_ID is not set: /stats and /notify are disabled");
    }

    let database: Arc<dyn ReminderRepository> =
        Arc::new(Database::new(&config.database_path).await?);

    let http = Arc::new(Http::new(&config.discord_token));
    let notifier: Arc<dyn Notifier> = Arc::new(DiscordNotifier::new(http));

    let command_handler = CommandHandler::new(
        database.clone(),
        notifier.clone(),
        HandlerSettings::from(&config),
    );
    let component_handler = MessageComponentHandler::new(command_handler.clone());

    // Parse guild ID if provided for development mode
    let guild_id = config
        .discord_guild_id
        .as_ref()
        .and_then(|id| id.parse::<u64>().ok())
        .map(GuildId);

    let handler = Handler::new(command_handler, component_handler, guild_id);

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            error!("This could indicate:");
            error!("  - Invalid bot token format");
            error!("  - Network issues reaching Discord API");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    // Start the reminder scheduler
    let scheduler = ReminderScheduler::new(
        ReminderEngine::new(database.clone(), config.counting_mode),
        notifier,
        config.timezone,
        config.poll_interval,
        config.delivery_timeout,
    )
    .spawn();

    // Start the companion endpoint when configured
    if let (Some(addr), Some(token)) = (config.companion_addr.clone(), config.companion_token.clone())
    {
        let state = CompanionState::new(database.clone(), &token);
        tokio::spawn(async move {
            if let Err(e) = web::serve(&addr, state).await {
                error!("Companion endpoint stopped: {e}");
            }
        });
    }

    info!("Bot configured successfully. Connecting to Discord gateway...");

    let outcome = tokio::select! {
        started = client.start() => started.map_err(|why| {
            error!("Gateway connection failed: {why:?}");
            error!("This could be due to:");
            error!("  - Invalid bot token");
            error!("  - Network connectivity issues");
            error!("  - Discord API outage");
            anyhow::anyhow!("Failed to establish gateway connection: {}", why)
        }),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    scheduler.shutdown().await;
    client.shard_manager.lock().await.shutdown_all().await;
    info!("👋 Pillbox stopped");

    outcome
}
