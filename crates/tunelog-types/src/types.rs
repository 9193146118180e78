//! Core reading types.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::{ParseError, ParseResult};

/// Status recorded when a payload does not carry one.
pub const DEFAULT_STATUS: &str = "Unknown";

/// Ordinal used for any status outside the recognized label set.
///
/// The same sentinel covers "no status reported" and "unknown label".
pub const UNRECOGNIZED_STATUS_VALUE: i8 = -1;

/// Column headers shared by both durable log encodings.
pub const LOG_HEADER: [&str; 3] = ["Timestamp", "Frequency (Hz)", "Tuning Status"];

/// Second-precision timestamp format used on disk and on the wire.
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[cfg(feature = "serde")]
time::serde::format_description!(
    log_timestamp,
    PrimitiveDateTime,
    "[year]-[month]-[day] [hour]:[minute]:[second]"
);

/// Recognized tuning classifications, ordered by pitch.
///
/// # Examples
///
/// ```
/// use tunelog_types::TuningStatus;
///
/// assert_eq!(TuningStatus::from_label("Too High"), Some(TuningStatus::TooHigh));
/// assert_eq!(TuningStatus::InTune.ordinal(), 1);
/// assert!(TuningStatus::TooLow < TuningStatus::TooHigh);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i8)]
pub enum TuningStatus {
    /// String is flat.
    TooLow = 0,
    /// String is within tolerance.
    InTune = 1,
    /// String is sharp.
    TooHigh = 2,
}

impl TuningStatus {
    /// All recognized statuses in ordinal order.
    pub const ALL: [TuningStatus; 3] = [Self::TooLow, Self::InTune, Self::TooHigh];

    /// Match a label exactly as the tuner reports it.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Too Low" => Some(Self::TooLow),
            "In Tune" => Some(Self::InTune),
            "Too High" => Some(Self::TooHigh),
            _ => None,
        }
    }

    /// The label as reported by the tuner.
    pub fn label(self) -> &'static str {
        match self {
            Self::TooLow => "Too Low",
            Self::InTune => "In Tune",
            Self::TooHigh => "Too High",
        }
    }

    /// Position on the status chart axis.
    pub fn ordinal(self) -> i8 {
        self as i8
    }
}

impl fmt::Display for TuningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a status label to its chart ordinal.
///
/// Total: unrecognized labels map to [`UNRECOGNIZED_STATUS_VALUE`].
pub fn status_value(label: &str) -> i8 {
    TuningStatus::from_label(label)
        .map(TuningStatus::ordinal)
        .unwrap_or(UNRECOGNIZED_STATUS_VALUE)
}

/// A single frequency observation from the tuner.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Wall-clock time the reading was accepted, second precision, no offset.
    #[cfg_attr(feature = "serde", serde(with = "log_timestamp"))]
    pub timestamp: PrimitiveDateTime,
    /// Detected frequency in Hz.
    pub frequency: f64,
    /// Tuning classification label, never empty.
    pub status: String,
}

impl Reading {
    /// Create a reading. An empty status is replaced with [`DEFAULT_STATUS`].
    pub fn new(timestamp: PrimitiveDateTime, frequency: f64, status: impl Into<String>) -> Self {
        let mut status = status.into();
        if status.is_empty() {
            status = DEFAULT_STATUS.to_string();
        }
        Self {
            timestamp,
            frequency,
            status,
        }
    }

    /// Chart ordinal of this reading's status.
    pub fn status_value(&self) -> i8 {
        status_value(&self.status)
    }

    /// The recognized status, if any.
    pub fn tuning_status(&self) -> Option<TuningStatus> {
        TuningStatus::from_label(&self.status)
    }

    /// Timestamp rendered in the log format.
    pub fn timestamp_string(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

/// Render a timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(timestamp: PrimitiveDateTime) -> String {
    timestamp
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| timestamp.to_string())
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn parse_timestamp(value: &str) -> ParseResult<PrimitiveDateTime> {
    PrimitiveDateTime::parse(value.trim(), TIMESTAMP_FORMAT).map_err(|source| {
        ParseError::InvalidTimestamp {
            value: value.to_string(),
            source,
        }
    })
}

/// Current local wall-clock time truncated to whole seconds.
///
/// Falls back to UTC when the local offset cannot be determined.
pub fn wall_clock_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let now = now.replace_nanosecond(0).unwrap_or(now);
    PrimitiveDateTime::new(now.date(), now.time())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_status_value_mapping() {
        assert_eq!(status_value("Too Low"), 0);
        assert_eq!(status_value("In Tune"), 1);
        assert_eq!(status_value("Too High"), 2);
        assert_eq!(status_value("Unknown"), -1);
        assert_eq!(status_value(""), -1);
        assert_eq!(status_value("in tune"), -1);
    }

    #[test]
    fn test_tuning_status_round_trips_labels() {
        for status in TuningStatus::ALL {
            assert_eq!(TuningStatus::from_label(status.label()), Some(status));
            assert_eq!(status.to_string(), status.label());
        }
    }

    #[test]
    fn test_reading_new_replaces_empty_status() {
        let reading = Reading::new(datetime!(2024-01-01 00:00:00), 0.0, "");
        assert_eq!(reading.status, DEFAULT_STATUS);
        assert_eq!(reading.status_value(), UNRECOGNIZED_STATUS_VALUE);
        assert_eq!(reading.tuning_status(), None);
    }

    #[test]
    fn test_timestamp_format_and_parse() {
        let ts = datetime!(2024-03-09 07:05:01);
        let text = format_timestamp(ts);
        assert_eq!(text, "2024-03-09 07:05:01");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }

    #[test]
    fn test_parse_timestamp_rejects_other_formats() {
        assert!(parse_timestamp("2024-03-09T07:05:01").is_err());
        assert!(parse_timestamp("yesterday").is_err());

        let err = parse_timestamp("09/03/2024").unwrap_err();
        assert!(err.to_string().contains("09/03/2024"));
    }

    #[test]
    fn test_wall_clock_now_has_no_subseconds() {
        let now = wall_clock_now();
        assert_eq!(now.nanosecond(), 0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_reading_serialization() {
        let reading = Reading::new(datetime!(2024-11-02 14:03:27), 82.4, "In Tune");
        let json = serde_json::to_value(&reading).unwrap();

        assert_eq!(json["timestamp"], "2024-11-02 14:03:27");
        assert_eq!(json["frequency"], 82.4);
        assert_eq!(json["status"], "In Tune");

        let back: Reading = serde_json::from_value(json).unwrap();
        assert_eq!(back, reading);
    }
}
