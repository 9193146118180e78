//! Spreadsheet workbook log.

use std::path::{Path, PathBuf};

use tracing::info;
use umya_spreadsheet::{Spreadsheet, Worksheet};

use tunelog_types::{LOG_HEADER, ParseError, Reading, parse_timestamp};

use crate::error::{Error, Result};
use crate::log::Sink;

const TIMESTAMP_COLUMN: u32 = 1;
const FREQUENCY_COLUMN: u32 = 2;
const STATUS_COLUMN: u32 = 3;

/// Single-sheet XLSX workbook with the same header and rows as the CSV log.
///
/// The workbook is held in memory and the whole file is rewritten on every
/// append, so each append costs time proportional to the rows already logged.
/// Appends run under the ingest guard, so a large workbook slows every accept.
pub struct WorkbookSink {
    path: PathBuf,
    book: Spreadsheet,
    next_row: u32,
}

impl WorkbookSink {
    /// Load the workbook, or create it with the header row if it is missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            let book = umya_spreadsheet::reader::xlsx::read(&path)
                .map_err(|e| workbook_error(&path, e))?;
            let highest_row = first_sheet(&book, &path)?.get_highest_row();

            let mut sink = Self {
                path,
                book,
                next_row: highest_row + 1,
            };
            if highest_row == 0 {
                sink.write_header()?;
            }
            info!(
                "Loaded existing workbook at {} ({} data rows)",
                sink.path.display(),
                sink.next_row - 2
            );
            Ok(sink)
        } else {
            let mut sink = Self {
                path,
                book: umya_spreadsheet::new_file(),
                next_row: 1,
            };
            sink.write_header()?;
            info!("Initialized workbook at {}", sink.path.display());
            Ok(sink)
        }
    }

    fn write_header(&mut self) -> Result<()> {
        let sheet = self.sheet_mut()?;
        for (column, title) in (1u32..).zip(LOG_HEADER) {
            sheet.get_cell_mut((column, 1)).set_value_string(title);
        }
        self.save()?;
        self.next_row = 2;
        Ok(())
    }

    fn sheet_mut(&mut self) -> Result<&mut Worksheet> {
        let path = &self.path;
        self.book
            .get_sheet_mut(&0)
            .ok_or_else(|| missing_sheet(path))
    }

    fn save(&self) -> Result<()> {
        umya_spreadsheet::writer::xlsx::write(&self.book, &self.path)
            .map_err(|e| workbook_error(&self.path, e))
    }
}

impl Sink for WorkbookSink {
    fn name(&self) -> &'static str {
        "workbook"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, reading: &Reading) -> Result<()> {
        let row = self.next_row;
        let sheet = self.sheet_mut()?;
        sheet
            .get_cell_mut((TIMESTAMP_COLUMN, row))
            .set_value_string(reading.timestamp_string());
        sheet
            .get_cell_mut((FREQUENCY_COLUMN, row))
            .set_value_number(reading.frequency);
        sheet
            .get_cell_mut((STATUS_COLUMN, row))
            .set_value_string(reading.status.clone());

        // A failed save leaves next_row in place, so the next append
        // overwrites these cells instead of leaving a gap.
        self.save()?;
        self.next_row += 1;
        Ok(())
    }
}

/// Read a workbook log back into readings, in row order.
pub fn read_workbook_log<P: AsRef<Path>>(path: P) -> Result<Vec<Reading>> {
    let path = path.as_ref();
    let book = umya_spreadsheet::reader::xlsx::read(path).map_err(|e| workbook_error(path, e))?;
    let sheet = first_sheet(&book, path)?;

    let header: Vec<String> = (1u32..=3)
        .map(|column| sheet.get_value((column, 1)))
        .collect();
    if header.iter().map(String::as_str).ne(LOG_HEADER) {
        return Err(Error::InvalidHeader {
            path: path.to_path_buf(),
            found: header.join(","),
        });
    }

    let mut readings = Vec::new();
    for row in 2..=sheet.get_highest_row() {
        let invalid = |source| Error::InvalidRow {
            path: path.to_path_buf(),
            row: row as usize,
            source,
        };

        let timestamp =
            parse_timestamp(&sheet.get_value((TIMESTAMP_COLUMN, row))).map_err(invalid)?;
        let frequency_text = sheet.get_value((FREQUENCY_COLUMN, row));
        let frequency = frequency_text
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(ParseError::InvalidFrequency(frequency_text.clone())))?;
        let status = sheet.get_value((STATUS_COLUMN, row));

        readings.push(Reading::new(timestamp, frequency, status));
    }

    Ok(readings)
}

fn first_sheet<'a>(book: &'a Spreadsheet, path: &Path) -> Result<&'a Worksheet> {
    book.get_sheet(&0).ok_or_else(|| missing_sheet(path))
}

fn missing_sheet(path: &Path) -> Error {
    Error::Workbook {
        path: path.to_path_buf(),
        message: "workbook has no sheets".to_string(),
    }
}

fn workbook_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
