//! # taskdeck — terminal task board
//!
//! One set of tasks, four ways to look at it: a list table, a kanban board,
//! a month calendar, and a detail pane with checklists and a per-task
//! countdown timer.
//!
//! ## Quick start
//!
//! ```bash
//! # Launch with the default board view
//! taskdeck
//!
//! # Open the calendar instead
//! taskdeck --view calendar
//!
//! # Point at a different data file
//! taskdeck --data ~/somewhere/tasks.json
//! ```
//!
//! Data and configuration live in `~/.taskdeck` (`tasks.json` and
//! `config.toml`). Set `TASKDECK_HOME` to move the whole directory; the
//! legacy `TERMTASK_HOME` variable and `~/.termtask` directory from the
//! app's earlier name are still honoured as fallbacks.
//!
//! Edits are written back on a short debounce, through a temp file and an
//! atomic rename, so a crash never leaves a half-written data file. A file
//! that fails to parse is backed up beside itself and replaced with sample
//! data rather than stopping the app.

use clap::Parser;
use log::info;

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod store;
pub mod task;
pub mod timer;
pub mod tui {
    pub mod app;
    pub mod colors;
    pub mod input;
    pub mod run;
    pub mod task_form;
}

use cli::Cli;
use storage::FlushScheduler;
use store::Store;
use tui::app::App;

fn main() {
    let cli = Cli::parse();

    let home = config::home_dir();
    let _logger = match logging::init(&home) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("logging disabled: {e}");
            None
        }
    };

    let config_path = cli
        .config
        .unwrap_or_else(|| home.join("config.toml"));
    let cfg = config::load_config(&config_path, &home);

    let data_path = cli.data.unwrap_or_else(|| cfg.data_path.clone());
    info!(
        "starting with data file {} ({} columns configured)",
        data_path.display(),
        cfg.board_columns.len()
    );

    let snapshot = storage::load(&data_path);
    let scheduler = FlushScheduler::spawn(data_path, storage::DEBOUNCE_WINDOW);
    let store = Store::new(
        snapshot,
        cfg.board_columns.clone(),
        cfg.default_timer_minutes,
        scheduler.handle(),
    );

    let view = cli.view.unwrap_or(cfg.default_view);
    let mut app = App::new(store, cfg, scheduler.handle(), view);
    let result = tui::run::run_tui(&mut app);

    // Waits for the forced final flush; quitting must never drop an edit.
    scheduler.shutdown();

    if let Err(e) = result {
        eprintln!("taskdeck exited with an error: {e}");
        std::process::exit(1);
    }
}
