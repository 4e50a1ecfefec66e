use std::{fs::File, path::PathBuf};

use csv::ByteRecord;
use wattlog_client::domain::Reading;

use super::parse_record;
use crate::{
    parse::{ColumnMap, ParseError},
    pipeline::{EnvelopeStream, PipelineError, Source},
};

/// CSV export of half-hourly readings.
///
/// Expected header columns (by name, in any order):
/// - Début / start (`dd/mm/YYYY HH:MM:SS`)
/// - Fin / end (same format)
/// - Valeur (en kW) / value (comma or dot decimal separator)
pub struct CsvFileSource {
    path: PathBuf,
    delimiter: u8,
}

impl CsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

fn decode_fields(record: &ByteRecord) -> Result<Vec<&str>, ParseError> {
    record
        .iter()
        .enumerate()
        .map(|(field, bytes)| std::str::from_utf8(bytes).map_err(|_| ParseError::Encoding { field }))
        .collect()
}

#[async_trait::async_trait]
impl Source<Reading> for CsvFileSource {
    async fn stream(&self) -> EnvelopeStream<Reading> {
        // Blocking CSV reader inside a single async task; exports are a few thousand rows.
        let path = self.path.clone();
        let delimiter = self.delimiter;
        let s = async_stream::stream! {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to open CSV file {}: {e}", path.display())));
                    return;
                }
            };
            let mut rdr = csv::ReaderBuilder::new()
                .delimiter(delimiter)
                .flexible(true)
                .from_reader(file);

            let columns = match rdr.headers() {
                Ok(headers) => ColumnMap::from_headers(headers.iter()),
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to read CSV headers: {e}")));
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

            // Byte records so a badly encoded row is rejected alone.
            for (idx, result) in rdr.byte_records().enumerate() {
                let row = idx + 1;
                let record = match result {
                    Ok(r) => r,
                    Err(e) => {
                        yield Err(PipelineError::Source(format!("failed to read CSV record: {e}")));
                        return;
                    }
                };

                let cells = match decode_fields(&record) {
                    Ok(cells) => cells,
                    Err(source) => {
                        metrics::counter!("import_rows_unparsable_total").increment(1);
                        yield Err(PipelineError::Parse { row, source });
                        continue;
                    }
                };
                if let Some(item) = parse_record(&columns, &cells, row) {
                    yield item;
                }
            }
        };

        Box::pin(s)
    }
}
