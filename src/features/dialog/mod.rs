//! # Dialog Feature
//!
//! Multi-step reminder creation: medicine name, hour, minute, then course length.
//! The flow is an explicit state machine whose transitions are pure, executed by
//! [`DialogManager`] against the repository and the notifier.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod flow;
pub mod prompts;
pub mod state;
pub mod store;

pub use flow::DialogManager;
pub use state::{transition, CourseChoice, DialogInput, DialogState, Effect, PendingDialog, Transition};
pub use store::DialogStore;
