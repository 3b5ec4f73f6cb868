use serde::{Deserialize, Serialize};

/// Subject groups recognized in exam column names. Matching is a
/// case-sensitive substring test against the column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    Math,
    Science,
    English,
}

impl Subject {
    pub const ALL: [Subject; 3] = [Subject::Math, Subject::Science, Subject::English];

    pub fn keyword(&self) -> &'static str {
        match self {
            Subject::Math => "Math",
            Subject::Science => "Science",
            Subject::English => "English",
        }
    }
}

/// Mapping from subject to the ordered exam columns belonging to it.
/// Built once by the transformation stage, read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureGrouping {
    pub math: Vec<String>,
    pub science: Vec<String>,
    pub english: Vec<String>,
}

impl FeatureGrouping {
    pub fn columns(&self, subject: Subject) -> &[String] {
        match subject {
            Subject::Math => &self.math,
            Subject::Science => &self.science,
            Subject::English => &self.english,
        }
    }
}

/// Numerical/categorical column partition produced by the preparation stage.
/// The partition is exhaustive and disjoint over the prepared table's columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparationManifest {
    pub numerical_features: Vec<String>,
    pub categorical_features: Vec<String>,
}

/// Performance tier assigned to a cluster. Tiers are ranked by cluster mean
/// score, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceTier {
    Strong,
    Moderate,
    Weak,
}

impl PerformanceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceTier::Strong => "Strong",
            PerformanceTier::Moderate => "Moderate",
            PerformanceTier::Weak => "Weak",
        }
    }
}

impl std::fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Improvement label derived from the least-squares trend of a score series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImprovementStatus {
    Improving,
    Declining,
    Stable,
}

impl ImprovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImprovementStatus::Improving => "Improving",
            ImprovementStatus::Declining => "Declining",
            ImprovementStatus::Stable => "Stable",
        }
    }
}

impl std::fmt::Display for ImprovementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fitted clustering artifact: fixed parameters, the standardization fit,
/// per-cluster statistics, and the per-row assignment. Read-only once fitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterModel {
    pub n_clusters: usize,
    pub linkage: String,
    pub metric: String,
    /// Mean of the raw scores the scaler was fit on
    pub scaler_mean: f64,
    /// Population standard deviation of the raw scores the scaler was fit on
    pub scaler_std: f64,
    /// Mean raw score per cluster, indexed by cluster id
    pub cluster_means: Vec<f64>,
    /// Tier per cluster id, ranked by cluster mean descending
    pub tiers: Vec<PerformanceTier>,
    /// Cluster id per row, in row order
    pub assignments: Vec<usize>,
}

impl ClusterModel {
    pub fn tier_of_row(&self, row: usize) -> PerformanceTier {
        self.tiers[self.assignments[row]]
    }
}

/// One Ward merge step; the full history reconstructs the dendrogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeStep {
    pub left: usize,
    pub right: usize,
    pub cost: f64,
    pub size: usize,
}

/// Tier distribution for one clustering pass (overall or per subject).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierCounts {
    pub strong: usize,
    pub moderate: usize,
    pub weak: usize,
}

impl TierCounts {
    pub fn total(&self) -> usize {
        self.strong + self.moderate + self.weak
    }
}
