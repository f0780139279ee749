//! Durable storage behind the log store.
//!
//! Three variants share the [`Backend`] capability: a local CSV file, a
//! remote spreadsheet-like table, and a local CSV mirrored to a cloud file
//! store after every write.

mod local;
mod remote;
mod synced;

pub use local::LocalCsvBackend;
pub use remote::{RemoteTable, RemoteTableBackend};
pub use synced::{FileStore, SyncedCsvBackend};

use thiserror::Error;

use crate::codec::SkipDiagnostic;
use crate::models::LogEntry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend credentials expired: {0}")]
    AuthExpired(String),
    #[error("backend I/O failed: {0}")]
    TransientIo(String),
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::TransientIo(e.to_string())
    }
}

impl From<csv::Error> for BackendError {
    fn from(e: csv::Error) -> Self {
        BackendError::TransientIo(e.to_string())
    }
}

/// Result of a full read of the durable table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Decoded entries in table order.
    pub entries: Vec<LogEntry>,
    /// Table line of each entry in `entries` (the header is line 1).
    /// Left empty by backends that number rows by position.
    pub lines: Vec<usize>,
    /// Rows that could not be decoded.
    pub skipped: Vec<SkipDiagnostic>,
    /// The table does not exist yet and should be created with a header only.
    pub needs_init: bool,
}

impl ReadOutcome {
    #[must_use]
    pub fn uninitialized() -> Self {
        Self {
            needs_init: true,
            ..Self::default()
        }
    }

    /// Record a decoded entry read from `line`.
    pub fn push(&mut self, line: usize, entry: LogEntry) {
        self.lines.push(line);
        self.entries.push(entry);
    }

    /// Table line of the `idx`-th entry.
    #[must_use]
    pub fn line_of(&self, idx: usize) -> usize {
        self.lines
            .get(idx)
            .copied()
            .unwrap_or_else(|| crate::codec::data_line(idx))
    }
}

pub trait Backend {
    fn read_all(&mut self) -> Result<ReadOutcome, BackendError>;
    /// Replace the whole durable table with `entries`.
    fn write_all(&mut self, entries: &[LogEntry]) -> Result<(), BackendError>;
    fn append(&mut self, entry: &LogEntry) -> Result<(), BackendError>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn read_all(&mut self) -> Result<ReadOutcome, BackendError> {
        (**self).read_all()
    }

    fn write_all(&mut self, entries: &[LogEntry]) -> Result<(), BackendError> {
        (**self).write_all(entries)
    }

    fn append(&mut self, entry: &LogEntry) -> Result<(), BackendError> {
        (**self).append(entry)
    }
}
