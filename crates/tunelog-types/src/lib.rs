//! Value types for guitar tuner telemetry.
//!
//! This crate holds the pieces shared by the in-memory history, the durable
//! log and the HTTP service:
//!
//! - [`Reading`]: one timestamped (frequency, status) observation
//! - [`TuningStatus`] and [`status_value`]: the fixed label set and its chart ordinal
//! - The log timestamp format (`YYYY-MM-DD HH:MM:SS`) and column header names
//!
//! # Example
//!
//! ```
//! use tunelog_types::{Reading, status_value};
//! use time::macros::datetime;
//!
//! let reading = Reading::new(datetime!(2024-11-02 14:03:27), 82.41, "In Tune");
//! assert_eq!(reading.status_value(), 1);
//! assert_eq!(reading.timestamp_string(), "2024-11-02 14:03:27");
//! assert_eq!(status_value("Out of range"), -1);
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    DEFAULT_STATUS, LOG_HEADER, Reading, TIMESTAMP_FORMAT, TuningStatus,
    UNRECOGNIZED_STATUS_VALUE, format_timestamp, parse_timestamp, status_value, wall_clock_now,
};
