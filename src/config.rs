//! Pipeline configuration and the artifact directory layout.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Column name the cohort/grade column is renamed to during transformation.
pub const GRADE_COLUMN: &str = "Grade";
/// Stable row identifier assigned at ingestion.
pub const ID_COLUMN: &str = "Id";
/// Case-sensitive marker for exam-score columns during preparation.
pub const EXAM_MARKER: &str = "exam";
/// Fixed cluster count for every clustering pass.
pub const N_CLUSTERS: usize = 3;

/// Which rows the ingestion stage keeps from the source table.
#[derive(Debug, Clone, Default)]
pub enum CohortSelector {
    /// Keep every row
    #[default]
    All,
    /// Keep rows whose cohort cell equals this label
    Cohort(String),
    /// Keep rows sharing the cohort of the row with this enrollment id
    Enrollment(usize),
}

/// One run's worth of knobs, threaded explicitly through every stage call.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Source CSV with one row per student
    pub data_path: PathBuf,
    /// Directory all stage artifacts are written under
    pub artifact_dir: PathBuf,
    /// Name of the cohort column in the source data
    pub cohort_column: String,
    pub selector: CohortSelector,
    /// Fit the scaler and cluster model on a held-in train split only
    pub split_evaluation: bool,
    /// Persist the Ward merge history alongside the model
    pub emit_dendrogram: bool,
}

impl PipelineConfig {
    pub fn new(data_path: PathBuf, artifact_dir: PathBuf) -> Self {
        Self {
            data_path,
            artifact_dir,
            cohort_column: "Current Year (17/18)".to_string(),
            selector: CohortSelector::All,
            split_evaluation: false,
            emit_dendrogram: false,
        }
    }

    pub fn artifacts(&self) -> ArtifactPaths {
        ArtifactPaths::new(&self.artifact_dir)
    }
}

/// Stage-named artifact files under the artifact directory. Each stage writes
/// its own file and reads only its predecessor's, so a single run has no
/// writer contention; concurrent runs over one directory are unsupported.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub raw_data: PathBuf,
    pub prepared_data: PathBuf,
    pub preparation_manifest: PathBuf,
    pub reshaped_data: PathBuf,
    pub feature_groups: PathBuf,
    pub model: PathBuf,
    pub final_data: PathBuf,
    pub dendrogram: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            raw_data: dir.join("raw_data.csv"),
            prepared_data: dir.join("prepared_data.csv"),
            preparation_manifest: dir.join("preparation.json"),
            reshaped_data: dir.join("reshaped_data.csv"),
            feature_groups: dir.join("feature_groups.json"),
            model: dir.join("model.json"),
            final_data: dir.join("final_data.csv"),
            dendrogram: dir.join("dendrogram.json"),
        }
    }

    pub fn ensure_dir(&self) -> Result<()> {
        if let Some(dir) = self.raw_data.parent() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Atomically persist a JSON artifact (write to a `.tmp` sibling, rename).
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let content = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}
