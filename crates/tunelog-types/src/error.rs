//! Error types for parsing tuner data.

use thiserror::Error;

/// Errors that can occur when parsing persisted tuner data.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A timestamp did not match `YYYY-MM-DD HH:MM:SS`.
    #[error("Invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        source: time::error::Parse,
    },

    /// A frequency cell was not a finite number.
    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),
}

/// Result type alias using tunelog-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
