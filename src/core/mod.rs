//! # Core Module
//!
//! Configuration, message sizing helpers and shared concurrency primitives.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Add keyed_lock for per-user event serialization
//! - 1.1.0: Add response module with Discord message chunking utilities
//! - 1.0.0: Initial creation with config module

pub mod config;
pub mod keyed_lock;
pub mod response;

// Re-export commonly used items
pub use config::{offset_label, parse_utc_offset, Config};
pub use keyed_lock::KeyedLocks;
pub use response::{chunk_for_message, chunk_text, truncate_label, LABEL_LIMIT, MESSAGE_LIMIT};
