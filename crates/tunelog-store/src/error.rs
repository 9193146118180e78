//! Error types for tunelog-store.

use std::fmt;
use std::path::PathBuf;

/// Result type for tunelog-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tunelog-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to create the log directory.
    #[error("Failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Delimited text log could not be read or written.
    #[error("CSV error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    /// Workbook could not be loaded or saved.
    #[error("Workbook error in {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    /// The log does not start with the expected header row.
    #[error("Unexpected header in {path}: {found}")]
    InvalidHeader { path: PathBuf, found: String },

    /// A persisted row could not be parsed back into a reading.
    #[error("Invalid row {row} in {path}: {source}")]
    InvalidRow {
        path: PathBuf,
        row: usize,
        source: tunelog_types::ParseError,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One sink that failed to persist a reading.
#[derive(Debug)]
pub struct SinkFailure {
    /// Name of the sink (`csv`, `workbook`).
    pub sink: &'static str,
    /// What went wrong.
    pub error: Error,
}

impl fmt::Display for SinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.sink, self.error)
    }
}

/// A reading was not persisted to every sink.
///
/// Sinks are independent; the ones not listed here did store the row.
#[derive(Debug, thiserror::Error)]
#[error("Failed to persist reading ({})", format_failures(.failures))]
pub struct PersistenceError {
    /// Every sink that failed, in append order.
    pub failures: Vec<SinkFailure>,
}

impl PersistenceError {
    /// Whether the named sink is among the failures.
    pub fn failed(&self, sink: &str) -> bool {
        self.failures.iter().any(|f| f.sink == sink)
    }
}

fn format_failures(failures: &[SinkFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
