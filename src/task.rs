//! Task data structures.
//!
//! This module defines the `Task` struct shared by every view, along with
//! its checklist entries. Tasks are owned exclusively by the `Store`; views
//! only read them or mutate through the store's API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single checklist entry on a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub label: String,
    #[serde(default)]
    pub done: bool,
}

impl ChecklistItem {
    pub fn new(label: impl Into<String>) -> Self {
        ChecklistItem {
            label: label.into(),
            done: false,
        }
    }
}

/// A tracked work item.
///
/// `status` names one of the configured board columns; the store normalises
/// unknown statuses to the first column when a snapshot is loaded. The timer
/// fields are flat on the task so the whole record round-trips through one
/// serde pass: `countdown_seconds` is the per-task default length that
/// `reset` restores, `remaining_seconds` counts down while `timer_running`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    pub due: Option<NaiveDate>,
    pub status: String,
    pub created_at_utc: i64,
    pub countdown_seconds: u64,
    pub remaining_seconds: u64,
    #[serde(default)]
    pub timer_running: bool,
}

impl Task {
    /// Build a fresh task in the given column with a paused timer.
    pub fn new(title: String, status: String, countdown_seconds: u64) -> Self {
        Task {
            id: Uuid::new_v4().to_string(),
            title,
            description: None,
            tags: Vec::new(),
            checklist: Vec::new(),
            due: None,
            status,
            created_at_utc: chrono::Utc::now().timestamp(),
            countdown_seconds,
            remaining_seconds: countdown_seconds,
            timer_running: false,
        }
    }
}
