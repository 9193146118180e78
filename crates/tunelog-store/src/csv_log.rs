//! Delimited text log.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use tunelog_types::{LOG_HEADER, ParseError, Reading, parse_timestamp};

use crate::error::{Error, Result};
use crate::log::Sink;

/// Append-only CSV file with a `Timestamp,Frequency (Hz),Tuning Status` header.
///
/// Each row is encoded in memory and written with a single `write_all`, so a
/// row whose write failed is never replayed by a later append.
pub struct CsvSink {
    path: PathBuf,
    file: File,
}

impl CsvSink {
    /// Open the file for append, creating it with the header row if it is
    /// missing or empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let needs_header = match std::fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(Error::Io(e)),
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut sink = Self { path, file };
        if needs_header {
            sink.write_row(LOG_HEADER)?;
            info!("Initialized CSV log at {}", sink.path.display());
        } else {
            info!("Appending to existing CSV log at {}", sink.path.display());
        }
        Ok(sink)
    }

    fn write_row<I, T>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let line = encode_row(row).map_err(|e| Error::Csv {
            path: self.path.clone(),
            source: e,
        })?;
        self.file.write_all(&line)?;
        self.file.flush()?;
        Ok(())
    }
}

/// Encode one record, terminator included.
fn encode_row<I, T>(row: I) -> std::result::Result<Vec<u8>, csv::Error>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(row)?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

impl Sink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, reading: &Reading) -> Result<()> {
        self.write_row([
            reading.timestamp_string(),
            reading.frequency.to_string(),
            reading.status.clone(),
        ])
    }
}

/// Read a CSV log back into readings, in file order.
pub fn read_csv_log<P: AsRef<Path>>(path: P) -> Result<Vec<Reading>> {
    let path = path.as_ref();
    let csv_error = |e: csv::Error| Error::Csv {
        path: path.to_path_buf(),
        source: e,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_error)?;

    let headers = reader.headers().map_err(csv_error)?;
    if headers.iter().ne(LOG_HEADER) {
        return Err(Error::InvalidHeader {
            path: path.to_path_buf(),
            found: headers.iter().collect::<Vec<_>>().join(","),
        });
    }

    let mut readings = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        // Header is row 1.
        let row = index + 2;
        let invalid = |source| Error::InvalidRow {
            path: path.to_path_buf(),
            row,
            source,
        };

        let timestamp = parse_timestamp(record.get(0).unwrap_or_default()).map_err(invalid)?;
        let frequency_text = record.get(1).unwrap_or_default();
        let frequency = frequency_text
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(ParseError::InvalidFrequency(frequency_text.to_string())))?;
        let status = record.get(2).unwrap_or_default();

        readings.push(Reading::new(timestamp, frequency, status));
    }

    Ok(readings)
}
