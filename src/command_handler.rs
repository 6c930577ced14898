//! # Command Handler
//!
//! Runs user commands, free text and pressed controls for one user at a time.
//! Everything goes through the [`Notifier`] and [`ReminderRepository`] traits so
//! the handler is independent of the chat platform.
//!
//! - **Version**: 3.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 3.0.0: Reminder commands, per-user event serialization, admin broadcast
//! - 2.0.0: Slash-only command handling
//! - 1.0.0: Initial release

use anyhow::Result;
use chrono::FixedOffset;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

use crate::commands::{parse_text_command, Command};
use crate::core::{offset_label, truncate_label, Config, KeyedLocks};
use crate::features::dialog::{CourseChoice, DialogInput, DialogManager};
use crate::features::rate_limiting::RateLimiter;
use crate::features::reminders::engine::{congratulation_text, taken_text};
use crate::features::reminders::{
    Acknowledgement, ChatId, CountingMode, Reminder, ReminderEngine, ReminderId, ReminderRepository,
    Stats,
};
use crate::message_components::{ComponentAction, MenuAction};
use crate::notifier::{Button, ButtonTone, ControlRow, Controls, MessageId, Notifier};

/// Delete buttons per list message (5 rows of 5)
pub const DELETE_CONTROLS_PER_MESSAGE: usize = 25;

const GENERIC_FAILURE: &str = "❌ Something went wrong. Please try again.";
const PERMISSION_DENIED: &str = "⛔ This command is only available to the bot administrator.";
const NO_REMINDERS: &str = "📭 You have no reminders yet. Use /add to create one.";
const REMINDER_GONE: &str = "This reminder no longer exists.";
const NOTIFY_USAGE: &str = "Usage: /notify <message>";
const UNKNOWN_COMMAND: &str = "🤔 Unknown command. Try /add, /list, /start or /stop.";

/// Settings the handler needs from the configuration
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub admin_user_id: Option<ChatId>,
    pub timezone: FixedOffset,
    pub counting_mode: CountingMode,
    pub delivery_timeout: Duration,
}

impl From<&Config> for HandlerSettings {
    fn from(config: &Config) -> Self {
        Self {
            admin_user_id: config.admin_user_id,
            timezone: config.timezone,
            counting_mode: config.counting_mode,
            delivery_timeout: config.delivery_timeout,
        }
    }
}

#[derive(Clone)]
pub struct CommandHandler {
    repository: Arc<dyn ReminderRepository>,
    notifier: Arc<dyn Notifier>,
    engine: ReminderEngine,
    dialog: Arc<DialogManager>,
    rate_limiter: Arc<RateLimiter>,
    locks: Arc<KeyedLocks<ChatId>>,
    admin_user_id: Option<ChatId>,
    zone: String,
    delivery_timeout: Duration,
}

impl CommandHandler {
    pub fn new(
        repository: Arc<dyn ReminderRepository>,
        notifier: Arc<dyn Notifier>,
        settings: HandlerSettings,
    ) -> Self {
        let zone = offset_label(&settings.timezone);
        CommandHandler {
            engine: ReminderEngine::new(repository.clone(), settings.counting_mode),
            dialog: Arc::new(DialogManager::new(
                repository.clone(),
                notifier.clone(),
                zone.clone(),
            )),
            repository,
            notifier,
            rate_limiter: Arc::new(RateLimiter::default()),
            locks: Arc::new(KeyedLocks::new()),
            admin_user_id: settings.admin_user_id,
            zone,
            delivery_timeout: settings.delivery_timeout,
        }
    }

    /// Replace the default inbound rate limiter
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = Arc::new(rate_limiter);
        self
    }

    pub fn engine(&self) -> &ReminderEngine {
        &self.engine
    }

    pub fn dialog(&self) -> &DialogManager {
        &self.dialog
    }

    fn is_admin(&self, chat_id: ChatId) -> bool {
        self.admin_user_id == Some(chat_id)
    }

    /// A slash command, or a menu button standing in for one
    pub async fn handle_command(&self, chat_id: ChatId, command: Command) -> Result<()> {
        let request_id = Uuid::new_v4();
        info!("[{request_id}] 🎯 Command /{} from {}", command.name(), chat_id);
        let _guard = self.locks.lock(&chat_id).await;
        self.run_command(request_id, chat_id, command).await
    }

    /// Free text from a DM
    pub async fn handle_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let request_id = Uuid::new_v4();
        debug!("[{request_id}] 💬 Text from {chat_id} ({} chars)", text.len());

        if !self.rate_limiter.check_rate_limit(chat_id) {
            warn!("[{request_id}] 🚫 Rate limit exceeded for {chat_id}");
            let wait = self.rate_limiter.retry_after(chat_id).unwrap_or_default();
            self.notifier
                .send_text(chat_id, &rate_limited_text(wait))
                .await?;
            return Ok(());
        }

        let _guard = self.locks.lock(&chat_id).await;
        match parse_text_command(text) {
            Some(command) => {
                info!("[{request_id}] 🎯 Text command /{} from {}", command.name(), chat_id);
                self.run_command(request_id, chat_id, command).await
            }
            None => self.dialog.handle_text(chat_id, text).await,
        }
    }

    /// A pressed button or picked option on message `origin`
    pub async fn handle_component(
        &self,
        chat_id: ChatId,
        action: ComponentAction,
        origin: MessageId,
    ) -> Result<()> {
        let request_id = Uuid::new_v4();
        debug!("[{request_id}] 🔘 {} from {}", action.custom_id(), chat_id);
        let _guard = self.locks.lock(&chat_id).await;

        let dialog_input = match action {
            ComponentAction::Hour(hour) => DialogInput::HourSelected(hour),
            ComponentAction::Time { hour, minute } => DialogInput::TimeSelected { hour, minute },
            ComponentAction::Course(days) => DialogInput::CourseSelected(CourseChoice::Days(days)),
            ComponentAction::CustomCourse => DialogInput::CourseSelected(CourseChoice::Custom),
            ComponentAction::Cancel => DialogInput::Cancel,
            ComponentAction::Delete(reminder_id) => {
                return self.guarded(request_id, chat_id, self.run_delete(chat_id, reminder_id)).await;
            }
            ComponentAction::Taken(reminder_id) => {
                return self
                    .guarded(request_id, chat_id, self.run_taken(chat_id, reminder_id, origin))
                    .await;
            }
            ComponentAction::Menu(menu) => {
                return self.run_command(request_id, chat_id, Command::from(menu)).await;
            }
        };
        self.dialog.handle_input(chat_id, dialog_input, origin).await
    }

    /// Runs a command; the caller holds the user's lock
    async fn run_command(&self, request_id: Uuid, chat_id: ChatId, command: Command) -> Result<()> {
        // Any command wins over an unfinished dialog
        if self.dialog.abort(chat_id).await {
            debug!("[{request_id}] 📝 Pending dialog of {chat_id} discarded by /{}", command.name());
        }

        match command {
            Command::Start => self.guarded(request_id, chat_id, self.run_start(chat_id)).await,
            Command::Add => self.guarded(request_id, chat_id, self.run_add(chat_id)).await,
            Command::List => self.guarded(request_id, chat_id, self.run_list(chat_id)).await,
            Command::Stop => self.guarded(request_id, chat_id, self.run_stop(chat_id)).await,
            Command::Stats => {
                if !self.is_admin(chat_id) {
                    debug!("[{request_id}] ⛔ /stats denied for {chat_id}");
                    self.notifier.send_text(chat_id, PERMISSION_DENIED).await?;
                    return Ok(());
                }
                self.guarded(request_id, chat_id, self.run_stats(chat_id)).await
            }
            Command::Notify(text) => {
                if !self.is_admin(chat_id) {
                    debug!("[{request_id}] ⛔ /notify denied for {chat_id}");
                    self.notifier.send_text(chat_id, PERMISSION_DENIED).await?;
                    return Ok(());
                }
                self.guarded(request_id, chat_id, self.run_notify(request_id, chat_id, &text))
                    .await
            }
            Command::Unknown(name) => {
                debug!("[{request_id}] Unknown command /{name} from {chat_id}");
                self.notifier.send_text(chat_id, UNKNOWN_COMMAND).await?;
                Ok(())
            }
        }
    }

    /// Log a failed operation and tell the user to try again
    async fn guarded<F>(&self, request_id: Uuid, chat_id: ChatId, operation: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        if let Err(e) = operation.await {
            error!("[{request_id}] ❌ Request from {chat_id} failed: {e}");
            if let Err(e) = self.notifier.send_text(chat_id, GENERIC_FAILURE).await {
                warn!("[{request_id}] Failed to report the failure to {chat_id}: {e}");
            }
        }
        Ok(())
    }

    async fn run_start(&self, chat_id: ChatId) -> Result<()> {
        self.repository.get_or_create_user(chat_id).await?;
        self.repository.set_active(chat_id, true).await?;
        info!("▶️ Reminders enabled for {chat_id}");

        let text = format!(
            "👋 Hi! I'll remind you to take your medicine on time.\n\n\
             Times are in {}.\n\
             /add creates a reminder, /list shows yours, /stop pauses them all.",
            self.zone
        );
        self.notifier
            .send_with_controls(chat_id, &text, &menu_controls(true))
            .await?;
        Ok(())
    }

    async fn run_add(&self, chat_id: ChatId) -> Result<()> {
        self.repository.get_or_create_user(chat_id).await?;
        self.dialog.begin(chat_id).await
    }

    async fn run_stop(&self, chat_id: ChatId) -> Result<()> {
        self.repository.get_or_create_user(chat_id).await?;
        self.repository.set_active(chat_id, false).await?;
        info!("⏸️ Reminders paused for {chat_id}");

        self.notifier
            .send_with_controls(
                chat_id,
                "⏸️ Reminders paused. Your reminders are kept; use /start to resume.",
                &menu_controls(false),
            )
            .await?;
        Ok(())
    }

    async fn run_list(&self, chat_id: ChatId) -> Result<()> {
        let user = self.repository.get_or_create_user(chat_id).await?;
        if user.reminders.is_empty() {
            self.notifier.send_text(chat_id, NO_REMINDERS).await?;
            return Ok(());
        }

        let mut text = format_reminder_list(&user.reminders, &self.zone);
        if !user.active {
            text.push_str("\n\n⏸️ Reminders are paused. Use /start to resume.");
        }

        for (i, batch) in user.reminders.chunks(DELETE_CONTROLS_PER_MESSAGE).enumerate() {
            let controls = delete_controls(batch);
            if i == 0 {
                self.notifier
                    .send_with_controls(chat_id, &text, &controls)
                    .await?;
            } else {
                self.notifier
                    .send_with_controls(chat_id, "🗑️ More reminders:", &controls)
                    .await?;
            }
        }
        Ok(())
    }

    async fn run_delete(&self, chat_id: ChatId, reminder_id: ReminderId) -> Result<()> {
        let medicine = self
            .repository
            .list_reminders(chat_id)
            .await?
            .into_iter()
            .find(|r| r.id == reminder_id)
            .map(|r| r.medicine);

        if self.repository.delete_reminder(chat_id, reminder_id).await? {
            info!("🗑️ Reminder {reminder_id} deleted by {chat_id}");
            let text = match medicine {
                Some(name) => format!("🗑️ Reminder \"{name}\" deleted"),
                None => "🗑️ Reminder deleted".to_string(),
            };
            self.notifier.send_text(chat_id, &text).await?;
        } else {
            self.notifier.send_text(chat_id, REMINDER_GONE).await?;
        }
        Ok(())
    }

    async fn run_taken(&self, chat_id: ChatId, reminder_id: ReminderId, origin: MessageId) -> Result<()> {
        match self.engine.acknowledge(chat_id, reminder_id).await? {
            Acknowledgement::Counted(outcome) => {
                let text = taken_text(&outcome.medicine, &outcome.progress_label());
                self.notifier.edit_text(chat_id, origin, &text, None).await?;
                if outcome.completed {
                    self.notifier
                        .send_text(chat_id, &congratulation_text(&outcome.medicine))
                        .await?;
                }
            }
            Acknowledgement::Noted(reminder) => {
                let text = taken_text(&reminder.medicine, &reminder.progress_label());
                self.notifier.edit_text(chat_id, origin, &text, None).await?;
            }
            Acknowledgement::Gone => {
                // Nothing was counted, so the stale reminder just goes away
                debug!("Taken pressed for missing reminder {reminder_id} by {chat_id}");
                self.notifier.delete_message(chat_id, origin).await?;
            }
        }
        Ok(())
    }

    async fn run_stats(&self, chat_id: ChatId) -> Result<()> {
        let stats = self.repository.stats().await?;
        self.notifier
            .send_text(chat_id, &format_stats(&stats))
            .await?;
        Ok(())
    }

    async fn run_notify(&self, request_id: Uuid, chat_id: ChatId, text: &str) -> Result<()> {
        if text.is_empty() {
            self.notifier.send_text(chat_id, NOTIFY_USAGE).await?;
            return Ok(());
        }

        let recipients = self.repository.list_user_ids().await?;
        let total = recipients.len();
        let mut sent = 0;
        for recipient in recipients {
            match timeout(self.delivery_timeout, self.notifier.send_text(recipient, text)).await {
                Ok(Ok(_)) => sent += 1,
                Ok(Err(e)) => warn!("[{request_id}] 📣 Broadcast to {recipient} failed: {e}"),
                Err(_) => warn!("[{request_id}] 📣 Broadcast to {recipient} timed out"),
            }
        }

        info!("[{request_id}] 📣 Broadcast delivered to {sent} of {total} users");
        self.notifier
            .send_text(chat_id, &format!("📣 Sent to {sent} of {total} users"))
            .await?;
        Ok(())
    }
}

pub fn rate_limited_text(wait: Duration) -> String {
    // Round up so the user never retries a moment too early
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    format!("⏳ You're sending messages too fast. Try again in {}s.", secs.max(1))
}

/// Add / list / pause-or-resume shortcuts
pub fn menu_controls(active: bool) -> Controls {
    let toggle = if active {
        Button::new("⏸️ Pause", ComponentAction::Menu(MenuAction::Stop), ButtonTone::Danger)
    } else {
        Button::new("▶️ Resume", ComponentAction::Menu(MenuAction::Start), ButtonTone::Success)
    };
    Controls::new(vec![ControlRow::Buttons(vec![
        Button::new("➕ Add", ComponentAction::Menu(MenuAction::Add), ButtonTone::Primary),
        Button::new(
            "📋 My reminders",
            ComponentAction::Menu(MenuAction::List),
            ButtonTone::Secondary,
        ),
        toggle,
    ])])
}

pub fn format_reminder_list(reminders: &[Reminder], zone: &str) -> String {
    let lines: Vec<String> = reminders
        .iter()
        .map(|r| {
            format!(
                "⏰ {} — 💊 {} — 📊 {}",
                r.time_label(),
                r.medicine,
                r.progress_label()
            )
        })
        .collect();
    format!("📋 Your reminders ({}):\n\n{}", zone, lines.join("\n"))
}

/// One delete button per reminder, five to a row
fn delete_controls(reminders: &[Reminder]) -> Controls {
    let rows = reminders
        .chunks(5)
        .map(|chunk| {
            ControlRow::Buttons(
                chunk
                    .iter()
                    .map(|r| {
                        Button::new(
                            truncate_label(&format!("🗑️ {} {}", r.time_label(), r.medicine)),
                            ComponentAction::Delete(r.id),
                            ButtonTone::Danger,
                        )
                    })
                    .collect(),
            )
        })
        .collect();
    Controls::new(rows)
}

pub fn format_stats(stats: &Stats) -> String {
    [
        "📊 Bot statistics".to_string(),
        String::new(),
        format!("👥 Users: {} ({} active)", stats.total_users, stats.active_users),
        format!("💊 Reminders: {}", stats.total_reminders),
        format!("   📅 Finite courses: {}", stats.finite_courses),
        format!("   ♾ Unbounded courses: {}", stats.unbounded_courses),
        String::new(),
        format!("✅ Doses taken: {} of {} planned", stats.doses_taken, stats.doses_planned),
    ]
    .join("\n")
}
