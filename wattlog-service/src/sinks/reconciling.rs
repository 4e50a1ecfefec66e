use futures::StreamExt;
use sqlx::SqlitePool;
use wattlog_client::domain::Reading;

use crate::{
    pipeline::{Envelope, PipelineError, Sink},
    reconcile::{apply_resolution, reconcile_one, ImportConflict, ImportReport, Resolution},
};

/// Reconciles a stream of readings against the store inside one transaction.
///
/// Row-level errors (parse, validation) are counted and skipped. Anything else, including
/// a store failure, rolls back every row accepted so far in the batch.
pub struct ReconcilingSink {
    pool: SqlitePool,
}

impl ReconcilingSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply one decision to every conflict, atomically. Returns the number of rows changed.
    pub async fn resolve(&self, conflicts: &[ImportConflict], resolution: Resolution) -> Result<usize, PipelineError> {
        if conflicts.is_empty() || resolution != Resolution::TakeNew {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(|e| PipelineError::Sink(e.to_string()))?;
        let mut changed = 0;
        for conflict in conflicts {
            if apply_resolution(&mut *tx, conflict, resolution).await? {
                changed += 1;
            }
        }
        tx.commit().await.map_err(|e| PipelineError::Sink(e.to_string()))?;

        tracing::info!(changed, "conflicting readings replaced with imported values");
        Ok(changed)
    }
}

#[async_trait::async_trait]
impl Sink<Reading> for ReconcilingSink {
    type Output = ImportReport;

    async fn run<S>(&self, mut input: S) -> Result<ImportReport, PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<Reading>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut tx = self.pool.begin().await.map_err(|e| PipelineError::Sink(e.to_string()))?;
        let mut report = ImportReport::default();

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) if e.is_row_level() => {
                    tracing::warn!(error = %e, "rejected import row");
                    report.rejected += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "import aborted, rolling back batch");
                    return Err(e);
                }
            };

            match reconcile_one(&mut *tx, env.payload).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    tracing::error!(error = %e, row = env.row, "store failure during import, rolling back batch");
                    metrics::counter!("import_store_errors_total").increment(1);
                    return Err(e);
                }
            }
        }

        tx.commit().await.map_err(|e| PipelineError::Sink(e.to_string()))?;

        metrics::counter!("import_rows_inserted_total").increment(report.inserted as u64);
        metrics::counter!("import_rows_unchanged_total").increment(report.unchanged as u64);
        metrics::counter!("import_rows_rejected_total").increment(report.rejected as u64);
        metrics::counter!("import_conflicts_total").increment(report.conflicts.len() as u64);

        tracing::info!(
            inserted = report.inserted,
            unchanged = report.unchanged,
            rejected = report.rejected,
            conflicts = report.conflicts.len(),
            "import batch committed"
        );
        Ok(report)
    }
}
