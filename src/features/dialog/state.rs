//! Reminder-creation dialog as an explicit state machine
//!
//! `transition` is pure: it takes the current pending dialog (if any) and one
//! input, and returns the next pending dialog plus the effects to run. The rest
//! state "none" is the absence of a [`PendingDialog`].

use crate::features::reminders::{NewReminder, CUSTOM_COURSE_RANGE};
use crate::notifier::{Controls, MessageId};

use super::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    WaitingMedicine,
    WaitingHour,
    WaitingMinute,
    WaitingCourse,
    WaitingCustomCourse,
}

/// In-flight dialog of one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDialog {
    /// Generation id, distinguishes a restarted dialog from the one it replaced
    pub dialog_id: u64,
    pub state: DialogState,
    pub medicine: String,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    /// The prompt message currently shown for this dialog
    pub message_id: Option<MessageId>,
}

impl PendingDialog {
    pub fn new(dialog_id: u64) -> Self {
        Self {
            dialog_id,
            state: DialogState::WaitingMedicine,
            medicine: String::new(),
            hour: None,
            minute: None,
            message_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseChoice {
    /// A preset length, 0 for unbounded
    Days(u32),
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogInput {
    Begin { dialog_id: u64 },
    Text(String),
    HourSelected(u8),
    TimeSelected { hour: u8, minute: u8 },
    CourseSelected(CourseChoice),
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a new prompt that becomes the dialog's message
    Prompt { text: String, controls: Controls },
    /// Rewrite the dialog's message in place
    EditPrompt {
        message_id: MessageId,
        text: String,
        controls: Controls,
    },
    DeleteMessage(MessageId),
    Notify(String),
    /// Persist the finished reminder, then remove the prompt and confirm
    Complete {
        draft: NewReminder,
        prompt_message: Option<MessageId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: Option<PendingDialog>,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: PendingDialog, effects: Vec<Effect>) -> Self {
        Self {
            next: Some(next),
            effects,
        }
    }

    fn done(effects: Vec<Effect>) -> Self {
        Self {
            next: None,
            effects,
        }
    }

    /// Keep `current` as it is and tell the user `text`
    fn stay(current: &PendingDialog, text: impl Into<String>) -> Self {
        Self::to(current.clone(), vec![Effect::Notify(text.into())])
    }
}

/// Advance the dialog by one input
///
/// `origin` is the message a pressed control belongs to; `zone` labels times.
pub fn transition(
    current: Option<&PendingDialog>,
    input: DialogInput,
    origin: Option<MessageId>,
    zone: &str,
) -> Transition {
    match input {
        DialogInput::Begin { dialog_id } => {
            let mut effects: Vec<Effect> = current
                .and_then(|p| p.message_id)
                .map(Effect::DeleteMessage)
                .into_iter()
                .collect();
            effects.push(Effect::Prompt {
                text: prompts::ASK_MEDICINE.to_string(),
                controls: Controls::cancel_only(),
            });
            Transition::to(PendingDialog::new(dialog_id), effects)
        }

        DialogInput::Cancel => {
            let message = origin.or_else(|| current.and_then(|p| p.message_id));
            let mut effects: Vec<Effect> = message.map(Effect::DeleteMessage).into_iter().collect();
            effects.push(Effect::Notify(prompts::CANCELLED.to_string()));
            Transition::done(effects)
        }

        DialogInput::Text(text) => match current {
            None => Transition::done(vec![Effect::Notify(prompts::NO_DIALOG_HINT.to_string())]),
            Some(p) => on_text(p, &text, zone),
        },

        DialogInput::HourSelected(hour) => match usable(current, origin) {
            Err(t) => t,
            Ok(p) if p.state != DialogState::WaitingHour => Transition::stay(p, prompts::OUT_OF_ORDER),
            Ok(p) => {
                let next = PendingDialog {
                    state: DialogState::WaitingMinute,
                    hour: Some(hour),
                    message_id: origin.or(p.message_id),
                    ..p.clone()
                };
                let text = prompts::minute_prompt(&next.medicine, hour);
                let effect = replace_prompt(next.message_id, text, prompts::minute_controls(hour));
                Transition::to(next, vec![effect])
            }
        },

        DialogInput::TimeSelected { hour, minute } => match usable(current, origin) {
            Err(t) => t,
            Ok(p) if p.state != DialogState::WaitingMinute || p.hour != Some(hour) => {
                Transition::stay(p, prompts::OUT_OF_ORDER)
            }
            Ok(p) => {
                let next = PendingDialog {
                    state: DialogState::WaitingCourse,
                    minute: Some(minute),
                    message_id: origin.or(p.message_id),
                    ..p.clone()
                };
                let text = prompts::course_prompt(&next.medicine, hour, minute);
                let effect = replace_prompt(next.message_id, text, prompts::course_controls());
                Transition::to(next, vec![effect])
            }
        },

        DialogInput::CourseSelected(choice) => match usable(current, origin) {
            Err(t) => t,
            Ok(p) if p.state != DialogState::WaitingCourse => Transition::stay(p, prompts::OUT_OF_ORDER),
            Ok(p) => match choice {
                CourseChoice::Days(days) => complete(p, days, origin.or(p.message_id)),
                CourseChoice::Custom => {
                    let next = PendingDialog {
                        state: DialogState::WaitingCustomCourse,
                        message_id: None,
                        ..p.clone()
                    };
                    let mut effects: Vec<Effect> = origin
                        .or(p.message_id)
                        .map(Effect::DeleteMessage)
                        .into_iter()
                        .collect();
                    effects.push(Effect::Prompt {
                        text: prompts::ASK_CUSTOM_COURSE.to_string(),
                        controls: Controls::cancel_only(),
                    });
                    Transition::to(next, effects)
                }
            },
        },
    }
}

fn on_text(p: &PendingDialog, text: &str, zone: &str) -> Transition {
    match p.state {
        DialogState::WaitingMedicine => {
            let medicine = text.trim();
            if medicine.is_empty() {
                return Transition::stay(p, prompts::EMPTY_MEDICINE);
            }
            if medicine.chars().count() > prompts::MAX_MEDICINE_LEN {
                return Transition::stay(p, prompts::medicine_too_long());
            }
            let next = PendingDialog {
                state: DialogState::WaitingHour,
                medicine: medicine.to_string(),
                message_id: None,
                ..p.clone()
            };
            let mut effects: Vec<Effect> =
                p.message_id.map(Effect::DeleteMessage).into_iter().collect();
            effects.push(Effect::Prompt {
                text: prompts::hour_prompt(medicine, zone),
                controls: prompts::hour_controls(),
            });
            Transition::to(next, effects)
        }
        DialogState::WaitingCustomCourse => {
            if p.medicine.is_empty() {
                return inconsistent(p.message_id);
            }
            match text.trim().parse::<u32>() {
                Ok(days) if CUSTOM_COURSE_RANGE.contains(&days) => complete(p, days, p.message_id),
                _ => Transition::stay(p, prompts::INVALID_CUSTOM_COURSE),
            }
        }
        DialogState::WaitingHour | DialogState::WaitingMinute | DialogState::WaitingCourse => {
            Transition::stay(p, prompts::USE_BUTTONS)
        }
    }
}

/// The pending dialog a control may act on, or the inconsistent-state transition
fn usable(current: Option<&PendingDialog>, origin: Option<MessageId>) -> Result<&PendingDialog, Transition> {
    match current {
        Some(p) if !p.medicine.is_empty() => Ok(p),
        Some(p) => Err(inconsistent(origin.or(p.message_id))),
        None => Err(inconsistent(origin)),
    }
}

fn inconsistent(message: Option<MessageId>) -> Transition {
    let mut effects: Vec<Effect> = message.map(Effect::DeleteMessage).into_iter().collect();
    effects.push(Effect::Notify(prompts::RESTART.to_string()));
    Transition::done(effects)
}

fn complete(p: &PendingDialog, course_days: u32, prompt_message: Option<MessageId>) -> Transition {
    match (p.hour, p.minute) {
        (Some(hour), Some(minute)) => Transition::done(vec![Effect::Complete {
            draft: NewReminder {
                medicine: p.medicine.clone(),
                hour,
                minute,
                course_days,
            },
            prompt_message,
        }]),
        _ => inconsistent(prompt_message),
    }
}

fn replace_prompt(message_id: Option<MessageId>, text: String, controls: Controls) -> Effect {
    match message_id {
        Some(message_id) => Effect::EditPrompt {
            message_id,
            text,
            controls,
        },
        None => Effect::Prompt { text, controls },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZONE: &str = "UTC+05:00";

    fn step(current: Option<&PendingDialog>, input: DialogInput, origin: Option<MessageId>) -> Transition {
        transition(current, input, origin, ZONE)
    }

    fn with_message(mut p: PendingDialog, message_id: MessageId) -> PendingDialog {
        p.message_id = Some(message_id);
        p
    }

    fn at(state: DialogState) -> PendingDialog {
        PendingDialog {
            dialog_id: 1,
            state,
            medicine: "Aspirin".to_string(),
            hour: Some(9),
            minute: Some(15),
            message_id: Some(10),
        }
    }

    #[test]
    fn test_full_walk_to_preset_course() {
        let t = step(None, DialogInput::Begin { dialog_id: 1 }, None);
        let p = with_message(t.next.unwrap(), 10);
        assert_eq!(p.state, DialogState::WaitingMedicine);

        let t = step(Some(&p), DialogInput::Text("  Aspirin ".into()), None);
        assert_eq!(t.effects[0], Effect::DeleteMessage(10));
        let p = with_message(t.next.unwrap(), 11);
        assert_eq!(p.state, DialogState::WaitingHour);
        assert_eq!(p.medicine, "Aspirin");

        let t = step(Some(&p), DialogInput::HourSelected(9), Some(11));
        let p = t.next.unwrap();
        assert_eq!(p.state, DialogState::WaitingMinute);
        assert!(matches!(t.effects[0], Effect::EditPrompt { message_id: 11, .. }));

        let t = step(Some(&p), DialogInput::TimeSelected { hour: 9, minute: 15 }, Some(11));
        let p = t.next.unwrap();
        assert_eq!(p.state, DialogState::WaitingCourse);

        let t = step(Some(&p), DialogInput::CourseSelected(CourseChoice::Days(7)), Some(11));
        assert_eq!(t.next, None);
        assert_eq!(
            t.effects,
            vec![Effect::Complete {
                draft: NewReminder {
                    medicine: "Aspirin".to_string(),
                    hour: 9,
                    minute: 15,
                    course_days: 7,
                },
                prompt_message: Some(11),
            }]
        );
    }

    #[test]
    fn test_blank_medicine_reprompts() {
        let p = PendingDialog::new(1);
        let t = step(Some(&p), DialogInput::Text("   ".into()), None);
        assert_eq!(t.next, Some(p));
        assert_eq!(t.effects, vec![Effect::Notify(prompts::EMPTY_MEDICINE.to_string())]);
    }

    #[test]
    fn test_custom_course_range() {
        let p = at(DialogState::WaitingCourse);
        let t = step(Some(&p), DialogInput::CourseSelected(CourseChoice::Custom), Some(10));
        let p = t.next.unwrap();
        assert_eq!(p.state, DialogState::WaitingCustomCourse);
        assert_eq!(t.effects[0], Effect::DeleteMessage(10));
        let p = with_message(p, 12);

        for bad in ["400", "0", "seven", "-3"] {
            let t = step(Some(&p), DialogInput::Text(bad.into()), None);
            assert_eq!(t.next.as_ref(), Some(&p), "input {bad}");
        }

        let t = step(Some(&p), DialogInput::Text("40".into()), None);
        assert_eq!(t.next, None);
        match &t.effects[0] {
            Effect::Complete {
                draft,
                prompt_message,
            } => {
                assert_eq!(draft.course_days, 40);
                assert_eq!(*prompt_message, Some(12));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_button_for_another_step_is_rejected() {
        let p = at(DialogState::WaitingCourse);
        let t = step(Some(&p), DialogInput::HourSelected(7), Some(10));
        assert_eq!(t.next, Some(p.clone()));
        assert_eq!(t.effects, vec![Effect::Notify(prompts::OUT_OF_ORDER.to_string())]);

        let p = at(DialogState::WaitingMinute);
        let t = step(Some(&p), DialogInput::TimeSelected { hour: 10, minute: 0 }, Some(10));
        assert_eq!(t.next, Some(p));
    }

    #[test]
    fn test_stale_button_without_dialog() {
        let t = step(None, DialogInput::CourseSelected(CourseChoice::Days(7)), Some(33));
        assert_eq!(t.next, None);
        assert_eq!(
            t.effects,
            vec![
                Effect::DeleteMessage(33),
                Effect::Notify(prompts::RESTART.to_string())
            ]
        );
    }

    #[test]
    fn test_empty_medicine_is_inconsistent() {
        let mut p = at(DialogState::WaitingHour);
        p.medicine.clear();
        let t = step(Some(&p), DialogInput::HourSelected(9), Some(10));
        assert_eq!(t.next, None);
        assert_eq!(t.effects.last(), Some(&Effect::Notify(prompts::RESTART.to_string())));
    }

    #[test]
    fn test_cancel_from_any_state() {
        for state in [
            DialogState::WaitingMedicine,
            DialogState::WaitingHour,
            DialogState::WaitingMinute,
            DialogState::WaitingCourse,
            DialogState::WaitingCustomCourse,
        ] {
            let p = at(state);
            let t = step(Some(&p), DialogInput::Cancel, None);
            assert_eq!(t.next, None);
            assert_eq!(t.effects[0], Effect::DeleteMessage(10));
        }
    }

    #[test]
    fn test_text_while_waiting_for_buttons() {
        let p = at(DialogState::WaitingHour);
        let t = step(Some(&p), DialogInput::Text("nine".into()), None);
        assert_eq!(t.next, Some(p));
        assert_eq!(t.effects, vec![Effect::Notify(prompts::USE_BUTTONS.to_string())]);

        let t = step(None, DialogInput::Text("hello".into()), None);
        assert_eq!(t.next, None);
        assert_eq!(t.effects, vec![Effect::Notify(prompts::NO_DIALOG_HINT.to_string())]);
    }
}
