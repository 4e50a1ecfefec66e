pub mod csv_file;
pub mod spreadsheet_file;

use std::path::Path;

use wattlog_client::domain::Reading;

pub use csv_file::CsvFileSource;
pub use spreadsheet_file::SpreadsheetFileSource;

use crate::{
    config::ImportConfig,
    parse::{parse_row, ColumnMap},
    pipeline::{Envelope, EnvelopeStream, PipelineError, Source},
};

/// Turn one record into a pipeline item. Entirely blank records yield nothing.
pub(crate) fn parse_record<S: AsRef<str>>(
    columns: &ColumnMap,
    cells: &[S],
    row: usize,
) -> Option<Result<Envelope<Reading>, PipelineError>> {
    let raw = columns.row(cells);
    if raw.start.is_empty() && raw.end.is_empty() && raw.value.is_empty() {
        return None;
    }

    Some(match parse_row(&raw) {
        Ok(reading) => Ok(Envelope::new(reading, row)),
        Err(source) => {
            metrics::counter!("import_rows_unparsable_total").increment(1);
            Err(PipelineError::Parse { row, source })
        }
    })
}

/// A readings source picked from the file extension.
pub enum ImportFileSource {
    Csv(CsvFileSource),
    Spreadsheet(SpreadsheetFileSource),
}

impl ImportFileSource {
    pub fn for_path(path: &Path, cfg: &ImportConfig) -> Result<Self, PipelineError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => {
                let delimiter = cfg.delimiter_byte().map_err(|e| PipelineError::Source(e.to_string()))?;
                Ok(Self::Csv(CsvFileSource::new(path).with_delimiter(delimiter)))
            }
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Self::Spreadsheet(SpreadsheetFileSource::new(
                path,
                cfg.sheet_index,
                cfg.skip_rows,
            ))),
            other => Err(PipelineError::Source(format!(
                "unsupported import file type '{other}' for {}",
                path.display()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl Source<Reading> for ImportFileSource {
    async fn stream(&self) -> EnvelopeStream<Reading> {
        match self {
            Self::Csv(s) => s.stream().await,
            Self::Spreadsheet(s) => s.stream().await,
        }
    }
}
