//! File-based logging bootstrap.
//!
//! The TUI owns the terminal while it runs, so diagnostics go to rotated
//! files under `<home>/logs` instead of stderr. Initialization failures are
//! reported, never fatal.

use std::path::Path;

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};

const LOG_BASENAME: &str = "taskdeck";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 2 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;

/// Start rotated file logging under `home/logs`.
///
/// The returned handle must stay alive for the process lifetime; dropping
/// it stops the buffered writer. Respects `RUST_LOG` for the level filter.
pub fn init(home: &Path) -> Result<LoggerHandle, String> {
    let log_dir = home.join("logs");
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| format!("could not create log directory {}: {e}", log_dir.display()))?;
    Logger::try_with_env_or_str("info")
        .map_err(|e| format!("bad log specification: {e}"))?
        .log_to_file(
            FileSpec::default()
                .directory(&log_dir)
                .basename(LOG_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .start()
        .map_err(|e| format!("could not start logger: {e}"))
}
