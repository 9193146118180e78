//! Append-only durable log over independent sinks.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info};

use tunelog_types::Reading;

use crate::csv_log::CsvSink;
use crate::error::{Error, PersistenceError, Result, SinkFailure};
use crate::workbook::WorkbookSink;

/// A persistent target that accepts one row per reading.
pub trait Sink: Send {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// File backing this sink.
    fn path(&self) -> &Path;

    /// Persist one row. The row must be durable once this returns `Ok`.
    fn append(&mut self, reading: &Reading) -> Result<()>;
}

/// Locations of the two log files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    /// Directory holding both files.
    pub dir: PathBuf,
    /// Delimited text log file name.
    pub csv_file: String,
    /// Workbook file name.
    pub workbook_file: String,
}

impl LogPaths {
    /// Describe the log files inside `dir`.
    pub fn new(
        dir: impl Into<PathBuf>,
        csv_file: impl Into<String>,
        workbook_file: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            csv_file: csv_file.into(),
            workbook_file: workbook_file.into(),
        }
    }

    /// Full path of the delimited text log.
    pub fn csv_path(&self) -> PathBuf {
        self.dir.join(&self.csv_file)
    }

    /// Full path of the workbook.
    pub fn workbook_path(&self) -> PathBuf {
        self.dir.join(&self.workbook_file)
    }
}

/// Writes every reading to all sinks, one writer at a time.
///
/// Sinks are attempted in order on every append. A failing sink is reported
/// and skipped for that row; it never prevents the others from writing.
pub struct DurableLog {
    sinks: Mutex<Vec<Box<dyn Sink>>>,
}

impl fmt::Debug for DurableLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableLog")
            .field("sinks", &self.sink_names())
            .finish()
    }
}

impl DurableLog {
    /// Create or reopen both log files.
    ///
    /// Missing files are created with the header row; existing files are
    /// opened for append with their rows preserved. Calling this again on the
    /// same paths never duplicates the header.
    pub fn initialize(paths: &LogPaths) -> Result<Self> {
        if !paths.dir.exists() {
            std::fs::create_dir_all(&paths.dir).map_err(|e| Error::CreateDirectory {
                path: paths.dir.clone(),
                source: e,
            })?;
            info!("Created log directory {}", paths.dir.display());
        }

        let csv = CsvSink::open(paths.csv_path())?;
        let workbook = WorkbookSink::open(paths.workbook_path())?;

        Ok(Self::with_sinks(vec![Box::new(csv), Box::new(workbook)]))
    }

    /// Build a log over arbitrary sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self {
            sinks: Mutex::new(sinks),
        }
    }

    /// Names of the configured sinks, in append order.
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.lock().iter().map(|s| s.name()).collect()
    }

    /// Append one row to every sink.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] listing each sink that failed. Sinks not
    /// listed stored the row.
    pub fn append(&self, reading: &Reading) -> std::result::Result<(), PersistenceError> {
        let mut sinks = self.lock();
        let mut failures = Vec::new();

        for sink in sinks.iter_mut() {
            match sink.append(reading) {
                Ok(()) => debug!("Appended reading to {} log", sink.name()),
                Err(e) => {
                    error!(
                        "Failed to append reading to {} log at {}: {}",
                        sink.name(),
                        sink.path().display(),
                        e
                    );
                    failures.push(SinkFailure {
                        sink: sink.name(),
                        error: e,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PersistenceError { failures })
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Box<dyn Sink>>> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
