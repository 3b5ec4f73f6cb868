//! Student exam performance pipeline: CSV ingestion, cleaning, subject
//! grouping, per-student trend calculation, and Ward-linkage clustering into
//! performance tiers.

pub mod cluster;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod prepare;
pub mod report;
pub mod table;
pub mod transform;
pub mod trend;
