//! # Rate Limiting Feature
//!
//! Sliding-window limit on inbound DM events per user, so a flooding user
//! cannot monopolise the dialog or the database.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Keyed by chat id, non-blocking check
//! - 1.0.0: Initial release

pub mod limiter;

pub use limiter::RateLimiter;
