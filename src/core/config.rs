//! Environment-driven configuration
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Add dose counting mode and companion endpoint settings
//! - 1.0.0: Initial release with token, database and scheduler settings

use anyhow::{Context as _, Result};
use chrono::FixedOffset;
use std::env;
use std::time::Duration;

use crate::features::reminders::CountingMode;

/// Longest poll interval that still observes every quarter-hour slot at least once
pub const MAX_POLL_SECS: u64 = 15 * 60 - 1;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub discord_guild_id: Option<String>,
    pub database_path: String,
    pub log_level: String,
    pub admin_user_id: Option<i64>,
    pub timezone: FixedOffset,
    pub poll_interval: Duration,
    pub delivery_timeout: Duration,
    pub counting_mode: CountingMode,
    pub companion_addr: Option<String>,
    pub companion_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let discord_token = env::var("DISCORD_TOKEN").context("DISCORD_TOKEN must be set")?;

        let admin_user_id = match optional_var("ADMIN_USER_ID") {
            Some(raw) => Some(
                raw.parse::<i64>()
                    .with_context(|| format!("ADMIN_USER_ID is not a valid id: {raw}"))?,
            ),
            None => None,
        };

        let timezone = parse_utc_offset(
            &optional_var("REMINDER_TIMEZONE").unwrap_or_else(|| "+05:00".to_string()),
        )?;

        let poll_secs = parse_secs("SCHEDULER_POLL_SECS", 15)?;
        if poll_secs == 0 || poll_secs > MAX_POLL_SECS {
            anyhow::bail!(
                "SCHEDULER_POLL_SECS must be between 1 and {MAX_POLL_SECS}, got {poll_secs}"
            );
        }

        let delivery_secs = parse_secs("DELIVERY_TIMEOUT_SECS", 10)?;
        if delivery_secs == 0 {
            anyhow::bail!("DELIVERY_TIMEOUT_SECS must be positive");
        }

        let counting_mode = optional_var("DOSE_COUNTING")
            .map(|raw| raw.parse::<CountingMode>())
            .transpose()?
            .unwrap_or_default();

        let companion_addr = optional_var("COMPANION_ADDR");
        let companion_token = optional_var("COMPANION_TOKEN");
        if companion_addr.is_some() && companion_token.is_none() {
            anyhow::bail!("COMPANION_TOKEN must be set when COMPANION_ADDR is enabled");
        }

        Ok(Config {
            discord_token,
            discord_guild_id: optional_var("DISCORD_GUILD_ID"),
            database_path: optional_var("DATABASE_PATH")
                .unwrap_or_else(|| "reminders.db".to_string()),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            admin_user_id,
            timezone,
            poll_interval: Duration::from_secs(poll_secs),
            delivery_timeout: Duration::from_secs(delivery_secs),
            counting_mode,
            companion_addr,
            companion_token,
        })
    }
}

/// Read a variable, treating empty values as unset
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_secs(name: &str, default: u64) -> Result<u64> {
    match optional_var(name) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{name} must be a whole number of seconds, got {raw}")),
        None => Ok(default),
    }
}

/// Parse a fixed UTC offset such as `+05:00`, `-03:30`, `+5` or `UTC`
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
        return FixedOffset::east_opt(0).context("zero offset");
    }

    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => anyhow::bail!("timezone offset must start with + or -: {raw}"),
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>()?, m.parse::<i32>()?),
        None => (rest.parse::<i32>()?, 0),
    };

    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        anyhow::bail!("timezone offset out of range: {raw}");
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .with_context(|| format!("invalid timezone offset: {raw}"))
}

/// Human readable label for a fixed offset, e.g. `UTC+05:00`
pub fn offset_label(offset: &FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    format!("UTC{}{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60)
}
