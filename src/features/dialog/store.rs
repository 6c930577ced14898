//! Process-wide map of pending dialogs, one per user
//!
//! Every read-modify-write runs under the map entry's shard lock, so a transition
//! for one user is atomic with respect to any other access to that user's dialog.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::state::{DialogState, Effect, PendingDialog, Transition};
use crate::features::reminders::ChatId;
use crate::notifier::MessageId;

#[derive(Default)]
pub struct DialogStore {
    dialogs: DashMap<ChatId, PendingDialog>,
    next_id: AtomicU64,
}

impl DialogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_dialog_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Run `f` against the user's dialog and store its result atomically
    ///
    /// Returns the effects and the id of the dialog left pending, if any.
    pub fn apply<F>(&self, chat_id: ChatId, f: F) -> (Vec<Effect>, Option<u64>)
    where
        F: FnOnce(Option<&PendingDialog>) -> Transition,
    {
        match self.dialogs.entry(chat_id) {
            Entry::Occupied(mut entry) => {
                let Transition { next, effects } = f(Some(entry.get()));
                match next {
                    Some(next) => {
                        let id = next.dialog_id;
                        entry.insert(next);
                        (effects, Some(id))
                    }
                    None => {
                        entry.remove();
                        (effects, None)
                    }
                }
            }
            Entry::Vacant(entry) => {
                let Transition { next, effects } = f(None);
                match next {
                    Some(next) => {
                        let id = next.dialog_id;
                        entry.insert(next);
                        (effects, Some(id))
                    }
                    None => (effects, None),
                }
            }
        }
    }

    /// Record the prompt shown for `dialog_id`
    ///
    /// Ignored when the dialog was replaced or finished in the meantime.
    pub fn attach_message(&self, chat_id: ChatId, dialog_id: u64, message_id: MessageId) -> bool {
        match self.dialogs.get_mut(&chat_id) {
            Some(mut pending) if pending.dialog_id == dialog_id => {
                pending.message_id = Some(message_id);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, chat_id: ChatId) -> Option<PendingDialog> {
        self.dialogs.get(&chat_id).map(|p| p.clone())
    }

    pub fn state(&self, chat_id: ChatId) -> Option<DialogState> {
        self.dialogs.get(&chat_id).map(|p| p.state)
    }

    pub fn clear(&self, chat_id: ChatId) -> Option<PendingDialog> {
        self.dialogs.remove(&chat_id).map(|(_, p)| p)
    }

    /// Dialogs currently pending across all users
    pub fn len(&self) -> usize {
        self.dialogs.len()
    }
}
