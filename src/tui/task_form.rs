//! Add-task form state for the terminal user interface.

use crate::error::Error;
use crate::store::{parse_due_input, split_and_normalise_tags, NewTask};
use crate::task::ChecklistItem;
use crate::tui::input::InputField;

pub const FIELD_COUNT: usize = 6;

/// The form fields, in tab order.
pub struct TaskForm {
    pub title: InputField,
    pub description: InputField,
    pub tags: InputField,
    pub due: InputField,
    pub checklist: InputField,
    pub countdown: InputField,
    pub current_field: usize,
}

impl TaskForm {
    pub fn new() -> Self {
        TaskForm {
            title: InputField::new(),
            description: InputField::new(),
            tags: InputField::new(),
            due: InputField::new(),
            checklist: InputField::new(),
            countdown: InputField::new(),
            current_field: 0,
        }
    }

    pub fn next_field(&mut self) {
        self.current_field = (self.current_field + 1) % FIELD_COUNT;
    }

    pub fn prev_field(&mut self) {
        self.current_field = (self.current_field + FIELD_COUNT - 1) % FIELD_COUNT;
    }

    pub fn active_mut(&mut self) -> &mut InputField {
        match self.current_field {
            0 => &mut self.title,
            1 => &mut self.description,
            2 => &mut self.tags,
            3 => &mut self.due,
            4 => &mut self.checklist,
            _ => &mut self.countdown,
        }
    }

    pub fn field(&self, index: usize) -> &InputField {
        match index {
            0 => &self.title,
            1 => &self.description,
            2 => &self.tags,
            3 => &self.due,
            4 => &self.checklist,
            _ => &self.countdown,
        }
    }

    pub fn field_label(index: usize) -> &'static str {
        match index {
            0 => "Title",
            1 => "Description",
            2 => "Tags (comma separated)",
            3 => "Due (today, tomorrow, or YYYY-MM-DD)",
            4 => "Checklist (items separated by ;)",
            _ => "Countdown minutes",
        }
    }

    /// Parse the form into store input. The store still validates the
    /// title, so this only rejects what the store cannot see: malformed
    /// dates and non-numeric countdowns.
    pub fn to_new_task(&self) -> Result<NewTask, Error> {
        let due_raw = self.due.trimmed();
        let due = if due_raw.is_empty() {
            None
        } else {
            Some(parse_due_input(due_raw).ok_or_else(|| {
                Error::Validation("due date must be today, tomorrow, or YYYY-MM-DD".into())
            })?)
        };

        let countdown_raw = self.countdown.trimmed();
        let countdown_minutes = if countdown_raw.is_empty() {
            None
        } else {
            let minutes = countdown_raw.parse::<u64>().map_err(|_| {
                Error::Validation("countdown must be a number of minutes".into())
            })?;
            Some(minutes)
        };

        let checklist = self
            .checklist
            .value
            .split(';')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(ChecklistItem::new)
            .collect();

        let description = match self.description.trimmed() {
            "" => None,
            text => Some(text.to_string()),
        };

        Ok(NewTask {
            title: self.title.trimmed().to_string(),
            description,
            tags: split_and_normalise_tags(&self.tags.value),
            due,
            checklist,
            countdown_minutes,
        })
    }
}
