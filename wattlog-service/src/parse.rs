//! Typed parsing of one export row into a [`Reading`].

use time::{format_description::BorrowedFormatItem, macros::format_description, PrimitiveDateTime};
use wattlog_client::domain::Reading;

/// `dd/mm/YYYY HH:MM:SS`, as printed by the supplier's export.
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day]/[month]/[year] [hour]:[minute]:[second]");

/// Accepted header names for each field, export name first.
const START_HEADERS: [&str; 2] = ["Début", "start"];
const END_HEADERS: [&str; 2] = ["Fin", "end"];
const VALUE_HEADERS: [&str; 2] = ["Valeur (en kW)", "value"];

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("missing column '{0}'")]
    MissingColumn(&'static str),
    #[error("unexpected column '{0}'")]
    UnknownColumn(String),
    #[error("invalid timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: time::error::Parse,
    },
    #[error("invalid consumption value '{0}'")]
    Value(String),
    #[error("field {field} is not valid UTF-8")]
    Encoding { field: usize },
}

/// One raw row of the import table, still as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub start: String,
    pub end: String,
    pub value: String,
}

/// Positions of the three fields within a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    start: usize,
    end: usize,
    value: usize,
}

impl ColumnMap {
    /// Validate a header row. Blank header cells are tolerated, anything else must be known.
    pub fn from_headers<'a, I>(headers: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let (mut start, mut end, mut value) = (None, None, None);

        for (idx, raw) in headers.into_iter().enumerate() {
            let name = raw.trim();
            if name.is_empty() {
                continue;
            }
            if START_HEADERS.contains(&name) {
                start = Some(idx);
            } else if END_HEADERS.contains(&name) {
                end = Some(idx);
            } else if VALUE_HEADERS.contains(&name) {
                value = Some(idx);
            } else {
                return Err(ParseError::UnknownColumn(name.to_string()));
            }
        }

        Ok(Self {
            start: start.ok_or(ParseError::MissingColumn(START_HEADERS[0]))?,
            end: end.ok_or(ParseError::MissingColumn(END_HEADERS[0]))?,
            value: value.ok_or(ParseError::MissingColumn(VALUE_HEADERS[0]))?,
        })
    }

    /// Pick the three fields out of a record. Short records yield empty fields.
    pub fn row<S: AsRef<str>>(&self, cells: &[S]) -> ImportRow {
        let cell = |idx: usize| cells.get(idx).map(|c| c.as_ref().trim().to_string()).unwrap_or_default();
        ImportRow {
            start: cell(self.start),
            end: cell(self.end),
            value: cell(self.value),
        }
    }
}

fn parse_timestamp(s: &str) -> Result<PrimitiveDateTime, ParseError> {
    PrimitiveDateTime::parse(s.trim(), TIMESTAMP_FORMAT).map_err(|source| ParseError::Timestamp {
        value: s.to_string(),
        source,
    })
}

fn parse_value(s: &str) -> Result<f64, ParseError> {
    match s.trim().replace(',', ".").parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::Value(s.to_string())),
    }
}

pub fn parse_row(row: &ImportRow) -> Result<Reading, ParseError> {
    Ok(Reading {
        start_time: parse_timestamp(&row.start)?,
        end_time: parse_timestamp(&row.end)?,
        consumption_kwh: parse_value(&row.value)?,
    })
}

/// Canonical inverse of [`parse_row`].
pub fn format_row(reading: &Reading) -> Result<ImportRow, time::error::Format> {
    Ok(ImportRow {
        start: reading.start_time.format(TIMESTAMP_FORMAT)?,
        end: reading.end_time.format(TIMESTAMP_FORMAT)?,
        value: reading.consumption_kwh.to_string().replace('.', ","),
    })
}
