//! Duplicate-aware import of parsed readings.
//!
//! Each incoming reading is classified against the store by its `(start_time, end_time)`
//! key: new readings are persisted, re-submitted identical values are ignored, and
//! differing values are surfaced as [`ImportConflict`]s for a human to decide on.

use serde::Serialize;
use sqlx::SqliteConnection;
use time::PrimitiveDateTime;
use wattlog_client::{db, domain::Reading};

use crate::pipeline::PipelineError;

/// Two consumption values closer than this are the same observation.
pub const VALUE_TOLERANCE: f64 = 1e-6;

/// Lookup and write access to stored readings.
#[async_trait::async_trait]
pub trait ReadingStore: Send {
    async fn find_existing(
        &mut self,
        start_time: PrimitiveDateTime,
        end_time: PrimitiveDateTime,
    ) -> Result<Option<Reading>, PipelineError>;

    async fn persist(&mut self, reading: &Reading) -> Result<(), PipelineError>;

    /// Overwrite the stored value of an existing interval.
    async fn replace_value(&mut self, reading: &Reading) -> Result<bool, PipelineError>;
}

#[async_trait::async_trait]
impl ReadingStore for SqliteConnection {
    async fn find_existing(
        &mut self,
        start_time: PrimitiveDateTime,
        end_time: PrimitiveDateTime,
    ) -> Result<Option<Reading>, PipelineError> {
        db::find_reading(&mut *self, start_time, end_time)
            .await
            .map_err(|e| PipelineError::Sink(format!("{e:#}")))
    }

    async fn persist(&mut self, reading: &Reading) -> Result<(), PipelineError> {
        db::insert_reading(&mut *self, reading)
            .await
            .map_err(|e| PipelineError::Sink(format!("{e:#}")))
    }

    async fn replace_value(&mut self, reading: &Reading) -> Result<bool, PipelineError> {
        db::update_reading_value(&mut *self, reading.start_time, reading.end_time, reading.consumption_kwh)
            .await
            .map_err(|e| PipelineError::Sink(format!("{e:#}")))
    }
}

/// Same interval, different value. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportConflict {
    pub start_time: PrimitiveDateTime,
    pub end_time: PrimitiveDateTime,
    pub existing_value: f64,
    pub new_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepExisting,
    TakeNew,
    Ignore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Inserted,
    Unchanged,
    Conflict(ImportConflict),
}

/// Classify one reading and persist it when it is new.
pub async fn reconcile_one<S>(store: &mut S, reading: Reading) -> Result<Outcome, PipelineError>
where
    S: ReadingStore + ?Sized,
{
    match store.find_existing(reading.start_time, reading.end_time).await? {
        None => {
            store.persist(&reading).await?;
            Ok(Outcome::Inserted)
        }
        Some(existing) if (existing.consumption_kwh - reading.consumption_kwh).abs() < VALUE_TOLERANCE => {
            Ok(Outcome::Unchanged)
        }
        Some(existing) => Ok(Outcome::Conflict(ImportConflict {
            start_time: reading.start_time,
            end_time: reading.end_time,
            existing_value: existing.consumption_kwh,
            new_value: reading.consumption_kwh,
        })),
    }
}

/// Running tally of a batch import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub conflicts: Vec<ImportConflict>,
}

impl ImportReport {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Inserted => self.inserted += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Conflict(c) => self.conflicts.push(c),
        }
    }
}

/// Reconcile an in-memory batch in order, returning the conflicts in input order.
///
/// Atomicity is the caller's concern: pass a store scoped to a transaction.
pub async fn reconcile_batch<S, I>(store: &mut S, readings: I) -> Result<Vec<ImportConflict>, PipelineError>
where
    S: ReadingStore + ?Sized,
    I: IntoIterator<Item = Reading>,
{
    let mut report = ImportReport::default();
    for reading in readings {
        report.record(reconcile_one(store, reading).await?);
    }
    Ok(report.conflicts)
}

/// Apply a human decision to a conflict. Returns whether the store changed.
pub async fn apply_resolution<S>(
    store: &mut S,
    conflict: &ImportConflict,
    resolution: Resolution,
) -> Result<bool, PipelineError>
where
    S: ReadingStore + ?Sized,
{
    match resolution {
        Resolution::TakeNew => {
            let reading = Reading::new(conflict.start_time, conflict.end_time, conflict.new_value);
            store.replace_value(&reading).await
        }
        Resolution::KeepExisting | Resolution::Ignore => Ok(false),
    }
}
