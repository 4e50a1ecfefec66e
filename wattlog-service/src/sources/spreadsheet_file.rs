use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader};
use time::{macros::datetime, Duration};
use wattlog_client::domain::Reading;

use super::parse_record;
use crate::{
    parse::{ColumnMap, TIMESTAMP_FORMAT},
    pipeline::{EnvelopeStream, PipelineError, Source},
};

/// Spreadsheet export (`.xlsx` and friends) of half-hourly readings.
///
/// The supplier puts a preamble above the table, so `skip_rows` sheet rows are skipped
/// (counted from the top of the sheet) and the next row is the header.
pub struct SpreadsheetFileSource {
    path: PathBuf,
    sheet_index: usize,
    skip_rows: usize,
}

impl SpreadsheetFileSource {
    pub fn new<P: Into<PathBuf>>(path: P, sheet_index: usize, skip_rows: usize) -> Self {
        Self {
            path: path.into(),
            sheet_index,
            skip_rows,
        }
    }
}

/// Excel serial day number (1900 date system) to the export's text timestamp.
fn excel_serial_to_text(serial: f64) -> Option<String> {
    if !serial.is_finite() {
        return None;
    }
    let seconds = (serial * 86_400.0).round() as i64;
    let ts = datetime!(1899-12-30 00:00:00).checked_add(Duration::seconds(seconds))?;
    ts.format(TIMESTAMP_FORMAT).ok()
}

fn read_sheet(path: &Path, sheet_index: usize) -> Result<Range<Data>, PipelineError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| PipelineError::Source(format!("failed to open workbook {}: {e}", path.display())))?;
    match workbook.worksheet_range_at(sheet_index) {
        Some(Ok(range)) => Ok(range),
        Some(Err(e)) => Err(PipelineError::Source(format!("failed to read sheet {sheet_index}: {e}"))),
        None => Err(PipelineError::Source(format!("workbook has no sheet at index {sheet_index}"))),
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) => s.clone(),
        Data::DateTime(dt) => excel_serial_to_text(dt.as_f64()).unwrap_or_else(|| dt.as_f64().to_string()),
        other => other.to_string(),
    }
}

#[async_trait::async_trait]
impl Source<Reading> for SpreadsheetFileSource {
    async fn stream(&self) -> EnvelopeStream<Reading> {
        let path = self.path.clone();
        let sheet_index = self.sheet_index;
        let skip_rows = self.skip_rows;
        let s = async_stream::stream! {
            let range = match read_sheet(&path, sheet_index) {
                Ok(range) => range,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            // The range starts at the first used cell, not at A1.
            let first_row = range.start().map_or(0, |(row, _)| row as usize);
            let mut rows = range
                .rows()
                .skip(skip_rows.saturating_sub(first_row))
                .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());

            let columns = match rows.next() {
                Some(header) => ColumnMap::from_headers(header.iter().map(String::as_str)),
                None => {
                    yield Err(PipelineError::Source(format!("sheet {sheet_index} has no header row")));
                    return;
                }
            };
            let columns = match columns {
                Ok(c) => c,
                Err(e) => {
                    yield Err(PipelineError::Source(format!("{}: {e}", path.display())));
                    return;
                }
            };

            for (idx, cells) in rows.enumerate() {
                if let Some(item) = parse_record(&columns, &cells, idx + 1) {
                    yield item;
                }
            }
        };

        Box::pin(s)
    }
}
