//! User-facing texts and controls of the reminder dialog

use crate::features::reminders::{course_label, NewReminder};
use crate::message_components::ComponentAction;
use crate::notifier::{Button, ButtonTone, ControlRow, Controls, PickerOption};

/// Longest accepted medicine name, in characters
pub const MAX_MEDICINE_LEN: usize = 100;

pub const ASK_MEDICINE: &str = "💊 Enter the medicine name:";
pub const EMPTY_MEDICINE: &str = "The medicine name can't be empty. Enter the medicine name:";
pub const ASK_CUSTOM_COURSE: &str = "📅 Enter the number of course days (1 to 365):";
pub const INVALID_CUSTOM_COURSE: &str = "Please enter a whole number of days from 1 to 365:";
pub const USE_BUTTONS: &str = "👆 Please pick an option from the message above, or press ❌ Cancel.";
pub const OUT_OF_ORDER: &str = "⚠️ That button belongs to another step. Use the latest message.";
pub const RESTART: &str = "⚠️ This reminder setup is no longer active. Start again with /add";
pub const CANCELLED: &str = "❌ Cancelled";
pub const NO_DIALOG_HINT: &str = "Use /add to create a reminder or /list to see your reminders.";
pub const SAVE_FAILED: &str = "❌ Couldn't save the reminder. Please try again with /add";

pub fn medicine_too_long() -> String {
    format!("That name is too long (max {MAX_MEDICINE_LEN} characters). Enter the medicine name:")
}

pub fn hour_prompt(medicine: &str, zone: &str) -> String {
    format!("💊 {medicine}\n\nPick the hour ({zone}):")
}

pub fn minute_prompt(medicine: &str, hour: u8) -> String {
    format!("💊 {medicine}\n\nPick the time ({hour:02}:__):")
}

pub fn course_prompt(medicine: &str, hour: u8, minute: u8) -> String {
    format!("💊 {medicine}\n⏰ {hour:02}:{minute:02}\n\nPick the course length:")
}

pub fn saved(draft: &NewReminder, zone: &str) -> String {
    format!(
        "✅ Reminder added!\n\n💊 {}\n⏰ {:02}:{:02} ({})\n📅 Course: {}",
        draft.medicine,
        draft.hour,
        draft.minute,
        zone,
        course_label(draft.course_days)
    )
}

fn cancel_row() -> ControlRow {
    ControlRow::Buttons(vec![Button::new(
        "❌ Cancel",
        ComponentAction::Cancel,
        ButtonTone::Secondary,
    )])
}

fn hour_band(id: &str, placeholder: &str, hours: std::ops::RangeInclusive<u8>) -> ControlRow {
    ControlRow::Picker {
        id: id.to_string(),
        placeholder: placeholder.to_string(),
        options: hours
            .map(|hour| PickerOption {
                label: format!("{hour:02}:00"),
                action: ComponentAction::Hour(hour),
            })
            .collect(),
    }
}

/// Hours in three bands: morning, day and evening
pub fn hour_controls() -> Controls {
    Controls::new(vec![
        hour_band("hours_morning", "🌅 Morning 06–11", 6..=11),
        hour_band("hours_day", "☀️ Day 12–17", 12..=17),
        hour_band("hours_evening", "🌙 Evening 18–23", 18..=23),
        cancel_row(),
    ])
}

pub fn minute_controls(hour: u8) -> Controls {
    let buttons = crate::features::reminders::QUARTER_MARKS
        .iter()
        .map(|&minute| {
            Button::new(
                format!("{hour:02}:{minute:02}"),
                ComponentAction::Time { hour, minute },
                ButtonTone::Primary,
            )
        })
        .collect();
    Controls::new(vec![ControlRow::Buttons(buttons), cancel_row()])
}

pub fn course_controls() -> Controls {
    let preset = |days: u32| {
        Button::new(course_label(days), ComponentAction::Course(days), ButtonTone::Primary)
    };
    Controls::new(vec![
        ControlRow::Buttons(vec![preset(7), preset(14), preset(21)]),
        ControlRow::Buttons(vec![preset(30), preset(60), preset(90)]),
        ControlRow::Buttons(vec![
            Button::new(course_label(0), ComponentAction::Course(0), ButtonTone::Success),
            Button::new("✏️ Custom", ComponentAction::CustomCourse, ButtonTone::Secondary),
        ]),
        cancel_row(),
    ])
}
