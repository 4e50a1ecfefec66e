use std::{path::Path, sync::Arc};

use anyhow::Context;
use sqlx::SqlitePool;
use wattlog_client::domain::Reading;

use crate::{
    config::ImportConfig,
    pipeline::Pipeline,
    reconcile::ImportReport,
    sinks::ReconcilingSink,
    sources::ImportFileSource,
    transform::ReadingValidation,
};

/// Import one meter export as a single batch.
pub async fn import_file(pool: &SqlitePool, path: &Path, cfg: &ImportConfig) -> anyhow::Result<ImportReport> {
    let source = ImportFileSource::for_path(path, cfg)?;
    let pipeline: Pipeline<_, Reading, _> = Pipeline {
        source,
        transforms: vec![Arc::new(ReadingValidation)],
        sink: ReconcilingSink::new(pool.clone()),
    };

    let report = pipeline
        .run()
        .await
        .with_context(|| format!("importing {}", path.display()))?;

    tracing::info!(
        file = %path.display(),
        inserted = report.inserted,
        unchanged = report.unchanged,
        rejected = report.rejected,
        conflicts = report.conflicts.len(),
        "import finished"
    );
    Ok(report)
}
