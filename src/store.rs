//! The in-memory task store and its mutation API.
//!
//! `Store` is the single owner of live task state for the process lifetime.
//! Views never mutate task fields directly; they call the operations here,
//! each of which validates its input, applies the change by whole-field
//! replacement, and signals the persistence layer that a flush is owed.

use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::storage::FlushHandle;
use crate::task::{ChecklistItem, Task};

/// Current data file schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The full serializable state of all tasks at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Snapshot {
    pub fn new(tasks: Vec<Task>) -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION,
            tasks,
        }
    }
}

/// Input for `Store::add_task`.
#[derive(Debug, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub due: Option<NaiveDate>,
    pub checklist: Vec<ChecklistItem>,
    /// Per-task countdown override; the configured default applies when unset.
    pub countdown_minutes: Option<u64>,
}

/// In-memory collection of tasks plus the operations all views share.
pub struct Store {
    tasks: Vec<Task>,
    columns: Vec<String>,
    default_timer_minutes: u64,
    flush: FlushHandle,
}

impl Store {
    /// Build a store from a loaded snapshot and the configured board.
    ///
    /// Statuses that do not name a configured column are normalised to the
    /// first column so the column-membership invariant holds from the start.
    pub fn new(
        snapshot: Snapshot,
        columns: Vec<String>,
        default_timer_minutes: u64,
        flush: FlushHandle,
    ) -> Self {
        let mut tasks = snapshot.tasks;
        if let Some(first) = columns.first() {
            for task in tasks.iter_mut() {
                if !columns.contains(&task.status) {
                    task.status = first.clone();
                }
            }
        }
        Store {
            tasks,
            columns,
            default_timer_minutes,
            flush,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn default_timer_minutes(&self) -> u64 {
        self.default_timer_minutes
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Clone the current state into a serializable snapshot.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.tasks.clone())
    }

    fn position(&self, id: &str) -> Result<usize, Error> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Signal the persistence layer that the current state needs a flush.
    fn touch(&self) {
        self.flush.schedule(self.snapshot());
    }

    /// Create a task in the first configured column with a paused timer.
    pub fn add_task(&mut self, new: NewTask) -> Result<&Task, Error> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::Validation("title must not be empty".into()));
        }
        let tags = validate_tags(new.tags)?;
        let minutes = match new.countdown_minutes {
            Some(0) => {
                return Err(Error::Validation("countdown must be at least one minute".into()))
            }
            Some(m) => m,
            None => self.default_timer_minutes,
        };
        let first_column = self
            .columns
            .first()
            .cloned()
            .ok_or_else(|| Error::Validation("no board columns configured".into()))?;

        let mut task = Task::new(title, first_column, minutes * 60);
        task.description = new.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
        task.tags = tags;
        task.due = new.due;
        task.checklist = new.checklist;
        self.tasks.push(task);
        self.touch();
        let idx = self.tasks.len() - 1;
        Ok(&self.tasks[idx])
    }

    /// Advance a task to the next configured column.
    ///
    /// A task already in the last column stays there; repeated calls are
    /// idempotent and schedule no flush.
    pub fn move_next(&mut self, id: &str) -> Result<&Task, Error> {
        let idx = self.position(id)?;
        let current = self.tasks[idx].status.clone();
        let next = self
            .columns
            .iter()
            .position(|c| *c == current)
            .filter(|&i| i + 1 < self.columns.len())
            .map(|i| self.columns[i + 1].clone());
        if let Some(next) = next {
            self.tasks[idx].status = next;
            self.touch();
        }
        Ok(&self.tasks[idx])
    }

    /// Put a task straight into the last configured column. Idempotent.
    pub fn mark_done(&mut self, id: &str) -> Result<&Task, Error> {
        let idx = self.position(id)?;
        let last = self
            .columns
            .last()
            .cloned()
            .ok_or_else(|| Error::Validation("no board columns configured".into()))?;
        if self.tasks[idx].status != last {
            self.tasks[idx].status = last;
            self.touch();
        }
        Ok(&self.tasks[idx])
    }

    /// Flip the done flag of one checklist entry; returns the new value.
    pub fn toggle_checklist_item(&mut self, id: &str, index: usize) -> Result<bool, Error> {
        let idx = self.position(id)?;
        let len = self.tasks[idx].checklist.len();
        let item = self.tasks[idx]
            .checklist
            .get_mut(index)
            .ok_or(Error::OutOfRange { index, len })?;
        item.done = !item.done;
        let done = item.done;
        self.touch();
        Ok(done)
    }

    /// Replace a task's tag set.
    pub fn set_tags(&mut self, id: &str, tags: Vec<String>) -> Result<(), Error> {
        let tags = validate_tags(tags)?;
        let idx = self.position(id)?;
        self.tasks[idx].tags = tags;
        self.touch();
        Ok(())
    }

    /// Replace a task's due date.
    pub fn set_due_date(&mut self, id: &str, due: Option<NaiveDate>) -> Result<(), Error> {
        let idx = self.position(id)?;
        self.tasks[idx].due = due;
        self.touch();
        Ok(())
    }

    /// Tasks carrying `tag`, or all tasks when `tag` is `None`.
    ///
    /// Lazy read-only view in store order; exact tag match.
    pub fn filter_by_tag<'a>(&'a self, tag: Option<&'a str>) -> impl Iterator<Item = &'a Task> {
        self.tasks
            .iter()
            .filter(move |t| tag.map_or(true, |tag| t.tags.iter().any(|have| have == tag)))
    }

    /// Set both the countdown default and the remaining time to a preset.
    pub fn apply_timer_preset(&mut self, id: &str, minutes: u64) -> Result<(), Error> {
        if minutes == 0 {
            return Err(Error::Validation("preset must be at least one minute".into()));
        }
        let idx = self.position(id)?;
        let task = &mut self.tasks[idx];
        task.countdown_seconds = minutes * 60;
        task.remaining_seconds = minutes * 60;
        task.timer_running = false;
        self.touch();
        Ok(())
    }

    /// Toggle the countdown; returns whether it is now running.
    ///
    /// Starting a timer with nothing remaining is a silent no-op — the timer
    /// must be reset first. No state changes and no flush is scheduled.
    pub fn start_pause_timer(&mut self, id: &str) -> Result<bool, Error> {
        let idx = self.position(id)?;
        let task = &mut self.tasks[idx];
        if !task.timer_running && task.remaining_seconds == 0 {
            return Ok(false);
        }
        task.timer_running = !task.timer_running;
        let running = task.timer_running;
        self.touch();
        Ok(running)
    }

    /// Restore the countdown to its stored default, paused.
    pub fn reset_timer(&mut self, id: &str) -> Result<(), Error> {
        let idx = self.position(id)?;
        let task = &mut self.tasks[idx];
        task.remaining_seconds = task.countdown_seconds;
        task.timer_running = false;
        self.touch();
        Ok(())
    }

    /// Remove a task entirely, returning it.
    pub fn remove_task(&mut self, id: &str) -> Result<Task, Error> {
        let idx = self.position(id)?;
        let task = self.tasks.remove(idx);
        self.touch();
        Ok(task)
    }

    /// Subtract `elapsed_secs` from every running countdown in one step.
    ///
    /// Remaining time saturates at zero, at which point the running flag is
    /// forced off. Returns the ids of tasks whose timer state changed.
    pub fn advance_timers(&mut self, elapsed_secs: u64) -> Vec<String> {
        let mut changed = Vec::new();
        if elapsed_secs == 0 {
            return changed;
        }
        for task in self.tasks.iter_mut() {
            if task.timer_running && task.remaining_seconds > 0 {
                task.remaining_seconds = task.remaining_seconds.saturating_sub(elapsed_secs);
                if task.remaining_seconds == 0 {
                    task.timer_running = false;
                }
                changed.push(task.id.clone());
            }
        }
        if !changed.is_empty() {
            self.touch();
        }
        changed
    }
}

/// Trim, lowercase, and hyphenate a tag.
pub fn normalise_tag(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "-")
}

/// Split comma-separated tag input and normalise each entry.
pub fn split_and_normalise_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = input
        .split(',')
        .map(normalise_tag)
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

fn validate_tags(tags: Vec<String>) -> Result<Vec<String>, Error> {
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = normalise_tag(&tag);
        if tag.is_empty() {
            return Err(Error::Validation("tags must not be empty".into()));
        }
        out.push(tag);
    }
    out.sort();
    out.dedup();
    Ok(out)
}

/// Parse due-date input: "today", "tomorrow", or `YYYY-MM-DD`.
pub fn parse_due_input(s: &str) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();
    let today = Local::now().date_naive();
    match s.as_str() {
        "today" => Some(today),
        "tomorrow" => Some(today + Duration::days(1)),
        _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok(),
    }
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let days = (d - today).num_days();
            if days == 0 {
                "today".into()
            } else if days == 1 {
                "tomorrow".into()
            } else if days > 1 {
                format!("in {days}d")
            } else {
                format!("{}d late", -days)
            }
        }
    }
}

/// Format remaining seconds as `MM:SS`.
pub fn format_timer(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["backlog".into(), "in_progress".into(), "done".into()]
    }

    fn empty_store() -> Store {
        Store::new(Snapshot::new(Vec::new()), columns(), 25, FlushHandle::detached())
    }

    fn add(store: &mut Store, title: &str) -> String {
        store
            .add_task(NewTask {
                title: title.into(),
                ..NewTask::default()
            })
            .unwrap()
            .id
            .clone()
    }

    #[test]
    fn add_task_defaults_to_first_column_and_paused_timer() {
        let mut store = empty_store();
        let id = add(&mut store, "Write spec");
        let task = store.get(&id).unwrap();
        assert_eq!(task.status, "backlog");
        assert_eq!(task.remaining_seconds, 25 * 60);
        assert_eq!(task.countdown_seconds, 25 * 60);
        assert!(!task.timer_running);
    }

    #[test]
    fn add_task_rejects_blank_title() {
        let mut store = empty_store();
        let err = store
            .add_task(NewTask {
                title: "   ".into(),
                ..NewTask::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn move_next_walks_columns_and_stops_at_the_end() {
        let mut store = empty_store();
        let id = add(&mut store, "Write spec");
        assert_eq!(store.move_next(&id).unwrap().status, "in_progress");
        assert_eq!(store.move_next(&id).unwrap().status, "done");
        // No-op at the last column, repeatedly.
        assert_eq!(store.move_next(&id).unwrap().status, "done");
        assert_eq!(store.move_next(&id).unwrap().status, "done");
    }

    #[test]
    fn move_next_unknown_id_is_not_found() {
        let mut store = empty_store();
        assert!(matches!(store.move_next("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn mark_done_jumps_to_last_column_idempotently() {
        let mut store = empty_store();
        let id = add(&mut store, "ship it");
        store.mark_done(&id).unwrap();
        assert_eq!(store.get(&id).unwrap().status, "done");
        store.mark_done(&id).unwrap();
        assert_eq!(store.get(&id).unwrap().status, "done");
    }

    #[test]
    fn unknown_status_normalised_on_load() {
        let mut task = Task::new("odd".into(), "someday".into(), 60);
        task.id = "fixed".into();
        let store = Store::new(
            Snapshot::new(vec![task]),
            columns(),
            25,
            FlushHandle::detached(),
        );
        assert_eq!(store.get("fixed").unwrap().status, "backlog");
    }

    #[test]
    fn toggle_checklist_item_flips_and_bounds_checks() {
        let mut store = empty_store();
        let id = store
            .add_task(NewTask {
                title: "with list".into(),
                checklist: vec![ChecklistItem::new("first"), ChecklistItem::new("second")],
                ..NewTask::default()
            })
            .unwrap()
            .id
            .clone();
        assert!(store.toggle_checklist_item(&id, 0).unwrap());
        assert!(!store.toggle_checklist_item(&id, 0).unwrap());
        let err = store.toggle_checklist_item(&id, 2).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn set_tags_normalises_and_rejects_blank() {
        let mut store = empty_store();
        let id = add(&mut store, "tagged");
        store
            .set_tags(&id, vec!["Deep Work".into(), "focus".into(), "focus".into()])
            .unwrap();
        assert_eq!(store.get(&id).unwrap().tags, vec!["deep-work", "focus"]);
        let err = store.set_tags(&id, vec!["  ".into()]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        // Failed replacement left the previous tags alone.
        assert_eq!(store.get(&id).unwrap().tags, vec!["deep-work", "focus"]);
    }

    #[test]
    fn filter_by_tag_is_exact_and_none_means_all() {
        let mut store = empty_store();
        let a = add(&mut store, "a");
        let b = add(&mut store, "b");
        store.set_tags(&a, vec!["work".into()]).unwrap();
        store.set_tags(&b, vec!["workshop".into()]).unwrap();
        let hits: Vec<_> = store.filter_by_tag(Some("work")).map(|t| t.id.clone()).collect();
        assert_eq!(hits, vec![a.clone()]);
        assert_eq!(store.filter_by_tag(None).count(), 2);
        // Store order untouched by filtering.
        assert_eq!(store.tasks()[0].id, a);
    }

    #[test]
    fn apply_preset_resets_running_state() {
        let mut store = empty_store();
        let id = add(&mut store, "pomodoro");
        store.start_pause_timer(&id).unwrap();
        store.apply_timer_preset(&id, 5).unwrap();
        let task = store.get(&id).unwrap();
        assert_eq!(task.countdown_seconds, 300);
        assert_eq!(task.remaining_seconds, 300);
        assert!(!task.timer_running);
        assert!(matches!(
            store.apply_timer_preset(&id, 0),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn preset_start_tick_scenario_clamps_to_zero() {
        let mut store = empty_store();
        let id = add(&mut store, "sprint");
        store.apply_timer_preset(&id, 5).unwrap();
        assert!(store.start_pause_timer(&id).unwrap());
        let changed = store.advance_timers(301);
        assert_eq!(changed, vec![id.clone()]);
        let task = store.get(&id).unwrap();
        assert_eq!(task.remaining_seconds, 0);
        assert!(!task.timer_running);
    }

    #[test]
    fn starting_a_spent_timer_is_a_silent_noop() {
        let mut store = empty_store();
        let id = add(&mut store, "spent");
        store.apply_timer_preset(&id, 1).unwrap();
        store.start_pause_timer(&id).unwrap();
        store.advance_timers(60);
        let before = store.get(&id).unwrap().clone();
        assert!(!store.start_pause_timer(&id).unwrap());
        assert_eq!(store.get(&id).unwrap(), &before);
        // Reset re-arms it.
        store.reset_timer(&id).unwrap();
        assert!(store.start_pause_timer(&id).unwrap());
    }

    #[test]
    fn advance_timers_skips_paused_tasks() {
        let mut store = empty_store();
        let running = add(&mut store, "running");
        let paused = add(&mut store, "paused");
        store.start_pause_timer(&running).unwrap();
        let changed = store.advance_timers(10);
        assert_eq!(changed, vec![running.clone()]);
        assert_eq!(store.get(&paused).unwrap().remaining_seconds, 25 * 60);
        assert_eq!(store.get(&running).unwrap().remaining_seconds, 25 * 60 - 10);
    }

    #[test]
    fn remove_task_deletes_by_id() {
        let mut store = empty_store();
        let id = add(&mut store, "doomed");
        let removed = store.remove_task(&id).unwrap();
        assert_eq!(removed.title, "doomed");
        assert!(store.get(&id).is_none());
        assert!(matches!(store.remove_task(&id), Err(Error::NotFound(_))));
    }

    #[test]
    fn split_tags_dedupes_and_drops_blanks() {
        assert_eq!(
            split_and_normalise_tags("Focus, deep work, , focus"),
            vec!["deep-work", "focus"]
        );
    }

    #[test]
    fn due_input_parses_keywords_and_iso() {
        let today = Local::now().date_naive();
        assert_eq!(parse_due_input("today"), Some(today));
        assert_eq!(parse_due_input("Tomorrow"), Some(today + Duration::days(1)));
        assert_eq!(
            parse_due_input("2031-02-03"),
            NaiveDate::from_ymd_opt(2031, 2, 3)
        );
        assert_eq!(parse_due_input("soonish"), None);
    }

    #[test]
    fn relative_due_formatting() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 8).unwrap();
        assert_eq!(format_due_relative(None, today), "-");
        assert_eq!(format_due_relative(Some(today), today), "today");
        assert_eq!(
            format_due_relative(today.succ_opt(), today),
            "tomorrow"
        );
        assert_eq!(
            format_due_relative(NaiveDate::from_ymd_opt(2026, 8, 12), today),
            "in 4d"
        );
        assert_eq!(
            format_due_relative(NaiveDate::from_ymd_opt(2026, 8, 5), today),
            "3d late"
        );
    }

    #[test]
    fn timer_formatting_pads_both_fields() {
        assert_eq!(format_timer(0), "00:00");
        assert_eq!(format_timer(65), "01:05");
        assert_eq!(format_timer(25 * 60), "25:00");
    }
}
