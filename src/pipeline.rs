//! Sequential pipeline orchestrator.
//!
//! Stages run strictly in order and each reads only its predecessor's
//! persisted artifact, so a single run has a linear data flow. There is no
//! retry and no partial-result salvage: the first stage error aborts the run.
//! Concurrent runs over one artifact directory are unsupported; callers must
//! serialize them.

use tracing::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::table::Table;
use crate::{ingest, prepare, report, transform};

/// Run ingestion, preparation, transformation, and trend/clustering to
/// completion. On success `final_data.csv` exists and is readable; that is
/// the pipeline's only contract with the presentation layer.
pub fn run(config: &PipelineConfig) -> Result<Table> {
    info!(
        data = %config.data_path.display(),
        artifacts = %config.artifact_dir.display(),
        split_evaluation = config.split_evaluation,
        "pipeline run starting"
    );

    ingest::run(config)?;
    prepare::run(config)?;
    transform::run(config)?;
    let final_data = report::run(config)?;

    info!(rows = final_data.n_rows(), "pipeline run complete");
    Ok(final_data)
}
