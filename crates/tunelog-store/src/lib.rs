//! Reading retention and persistence for guitar tuner telemetry.
//!
//! This crate owns the two pieces of state behind the tuner service:
//!
//! - [`ReadingStore`]: a bounded, thread-safe sliding window of the most recent readings
//! - [`DurableLog`]: an append-only log written to two independent sinks,
//!   a delimited text file ([`CsvSink`]) and a spreadsheet workbook ([`WorkbookSink`])
//!
//! It also provides the [`report`] module, an offline analysis of a persisted log.
//!
//! # Example
//!
//! ```no_run
//! use tunelog_store::{DurableLog, LogPaths, ReadingStore};
//! use tunelog_types::{Reading, wall_clock_now};
//!
//! let store = ReadingStore::new(100);
//! let log = DurableLog::initialize(&LogPaths::new(
//!     "guitar_tuner_data",
//!     "tuning_data.csv",
//!     "tuning_data.xlsx",
//! ))?;
//!
//! let reading = Reading::new(wall_clock_now(), 82.41, "In Tune");
//! store.push(reading.clone());
//! if let Err(e) = log.append(&reading) {
//!     eprintln!("{e}");
//! }
//! # Ok::<(), tunelog_store::Error>(())
//! ```

mod csv_log;
mod error;
mod history;
mod log;
pub mod report;
mod stats;
mod workbook;

pub use csv_log::{CsvSink, read_csv_log};
pub use error::{Error, PersistenceError, Result, SinkFailure};
pub use history::{DEFAULT_MAX_POINTS, ReadingStore};
pub use log::{DurableLog, LogPaths, Sink};
pub use report::{Report, analyze, analyze_csv};
pub use workbook::{WorkbookSink, read_workbook_log};
