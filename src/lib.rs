// Core layer - shared types and configuration
pub mod core;

// Features layer - reminders, dialog, rate limiting
pub mod features;

// Outbound messaging
pub mod notifier;

// UI components
pub mod message_components;

// Infrastructure
pub mod database;

// Application layer
pub mod command_handler;
pub mod commands;

// Companion HTTP endpoint
pub mod web;

pub use core::Config;

pub use features::{DialogManager, RateLimiter, ReminderEngine, ReminderScheduler};
pub use notifier::Notifier;
