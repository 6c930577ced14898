//! # Feature: Rate Limiting
//!
//! Sliding window limiter over free-text input, keyed by chat id. Button
//! presses are bounded by the controls on screen and are not counted.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Key by chat id only, expose the retry delay instead of sleeping
//! - 1.0.0: Initial release with per-user sliding window rate limiting

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::features::reminders::ChatId;

/// Free-text messages allowed per window
pub const DEFAULT_MAX_MESSAGES: usize = 20;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    requests: DashMap<ChatId, Vec<Instant>>,
    max_requests: usize,
    time_window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        RateLimiter {
            requests: DashMap::new(),
            max_requests,
            time_window,
        }
    }

    /// Record one request for `chat_id`, returning false when over the limit
    pub fn check_rate_limit(&self, chat_id: ChatId) -> bool {
        let now = Instant::now();
        let mut entry = self.requests.entry(chat_id).or_default();

        entry.retain(|&time| now.duration_since(time) < self.time_window);

        if entry.len() >= self.max_requests {
            false
        } else {
            entry.push(now);
            true
        }
    }

    /// Time until the oldest request in the window expires
    pub fn retry_after(&self, chat_id: ChatId) -> Option<Duration> {
        let entry = self.requests.get(&chat_id)?;
        let oldest = entry.first()?;
        self.time_window.checked_sub(oldest.elapsed())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES, DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn test_rate_limiter_allows_under_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));

        assert!(limiter.check_rate_limit(1));
        assert!(limiter.check_rate_limit(1));
        assert!(limiter.check_rate_limit(1));
    }

    #[test]
    fn test_rate_limiter_blocks_over_limit() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));

        assert!(limiter.check_rate_limit(1));
        assert!(limiter.check_rate_limit(1));
        assert!(!limiter.check_rate_limit(1));
        assert!(limiter.retry_after(1).is_some());
    }

    #[tokio::test]
    async fn test_rate_limiter_resets_after_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(100));

        assert!(limiter.check_rate_limit(1));
        assert!(!limiter.check_rate_limit(1));

        sleep(Duration::from_millis(150)).await;
        assert!(limiter.check_rate_limit(1));
    }

    #[test]
    fn test_rate_limiter_per_chat() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));

        assert!(limiter.check_rate_limit(1));
        assert!(limiter.check_rate_limit(2));
        assert!(!limiter.check_rate_limit(1));
        assert!(!limiter.check_rate_limit(2));
        assert_eq!(limiter.retry_after(3), None);
    }
}
