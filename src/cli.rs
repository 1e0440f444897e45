use std::path::PathBuf;

use clap::Parser;

use crate::config::View;

/// Terminal task tracker with list, kanban, calendar, and detail views.
/// Data and configuration live under ~/.taskdeck (override with
/// TASKDECK_HOME; the legacy TERMTASK_HOME is honoured as a fallback).
#[derive(Parser)]
#[command(name = "taskdeck", version, about = "Terminal task board")]
pub struct Cli {
    /// Path to the JSON data file (overrides the configured data_path).
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Path to the config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// View to open at startup.
    #[arg(long, value_enum)]
    pub view: Option<View>,
}
