//! Error taxonomy shared by the store and persistence layer.

use thiserror::Error;

/// Errors reported to callers of store and storage operations.
///
/// Every variant is recoverable; nothing in the core terminates the
/// process. Corrupt data files never surface here: `storage::load`
/// converts corruption into a backup-and-reseed internally.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input to a mutation (blank title, blank tag, zero preset).
    #[error("invalid input: {0}")]
    Validation(String),

    /// An operation referenced a task ID the store does not hold.
    #[error("no task with id {0}")]
    NotFound(String),

    /// A checklist index past the end of the checklist.
    #[error("checklist index {index} out of range ({len} items)")]
    OutOfRange { index: usize, len: usize },

    /// The data file could not be written. In-memory state is kept and
    /// the write is retried on the next flush window.
    #[error("could not write data file: {0}")]
    Write(#[from] std::io::Error),
}
