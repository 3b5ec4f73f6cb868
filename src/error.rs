//! Error taxonomy for the pipeline.

use thiserror::Error;

/// Result type used throughout the pipeline stages.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Closed set of pipeline failures. Each variant names the stage or concern
/// that produced it, so callers can tell a missing source file from a schema
/// problem from a clustering failure.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Source data could not be loaded or the selector matched nothing
    #[error("ingestion error: {0}")]
    Ingestion(String),

    /// A required column is absent or the table shape is inconsistent
    #[error("schema error: {0}")]
    Schema(String),

    /// Clustering could not be performed on the given data
    #[error("clustering error: {0}")]
    Clustering(String),

    /// Filesystem failure while reading or writing an artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parse or serialize failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Manifest or model (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
