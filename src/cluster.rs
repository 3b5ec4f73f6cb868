//! Standardization and Ward-linkage agglomerative clustering over the 1-D
//! aggregate performance scores.
//!
//! The clustering is hierarchical with Euclidean distance and Ward's
//! criterion, fixed at three clusters. Given identical input order the merge
//! sequence is fully deterministic: the cheapest pair merges first and ties
//! break toward the lowest pair index.

use tracing::debug;

use crate::config::N_CLUSTERS;
use crate::error::{PipelineError, Result};
use crate::models::{ClusterModel, MergeStep, PerformanceTier};

/// Z-score scaler fit on a set of raw scores (population variance, so a
/// two-point fit behaves the same way the original StandardScaler did).
#[derive(Debug, Clone, Copy)]
pub struct Scaler {
    pub mean: f64,
    pub std: f64,
}

impl Scaler {
    pub fn fit(values: &[f64]) -> Self {
        let n = values.len().max(1) as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        Self {
            mean,
            // A constant column scales to all zeros instead of dividing by zero
            std: if std == 0.0 { 1.0 } else { std },
        }
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

/// Agglomerative Ward clustering of 1-D points down to `n_clusters` groups.
///
/// Returns the cluster id per input point (ids numbered by first row
/// membership, so they are stable across runs) and the merge history.
pub fn ward_cluster(
    values: &[f64],
    n_clusters: usize,
) -> Result<(Vec<usize>, Vec<MergeStep>)> {
    if values.len() < n_clusters {
        return Err(PipelineError::Clustering(format!(
            "need at least {} students to form {} clusters, got {}",
            n_clusters,
            n_clusters,
            values.len()
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::Clustering(
            "non-finite performance score in clustering input".to_string(),
        ));
    }

    // One active cluster per point to start; Ward dissimilarity between
    // singletons is half the squared Euclidean distance, updated with the
    // Lance-Williams recurrence as clusters merge.
    struct Cluster {
        members: Vec<usize>,
    }

    let n = values.len();
    let mut clusters: Vec<Option<Cluster>> = (0..n)
        .map(|i| Some(Cluster { members: vec![i] }))
        .collect();
    let mut dist = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = (values[i] - values[j]).powi(2) / 2.0;
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    let mut merges = Vec::with_capacity(n.saturating_sub(n_clusters));
    let mut active = n;

    while active > n_clusters {
        // Cheapest merge, ties toward the lowest (i, j)
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if clusters[i].is_none() {
                continue;
            }
            for j in (i + 1)..n {
                if clusters[j].is_none() {
                    continue;
                }
                let d = dist[i][j];
                if best.map_or(true, |(_, _, bd)| d < bd) {
                    best = Some((i, j, d));
                }
            }
        }
        let (i, j, cost) = best.ok_or_else(|| {
            PipelineError::Clustering("ran out of mergeable clusters".to_string())
        })?;

        let size_i = clusters[i].as_ref().map(|c| c.members.len()).unwrap_or(0);
        let size_j = clusters[j].as_ref().map(|c| c.members.len()).unwrap_or(0);
        let merged_size = size_i + size_j;

        // Lance-Williams update of Ward dissimilarity to every other cluster
        for k in 0..n {
            if k == i || k == j || clusters[k].is_none() {
                continue;
            }
            let size_k = clusters[k].as_ref().map(|c| c.members.len()).unwrap_or(0);
            let total = (merged_size + size_k) as f64;
            let updated = ((size_i + size_k) as f64 * dist[i][k]
                + (size_j + size_k) as f64 * dist[j][k]
                - size_k as f64 * dist[i][j])
                / total;
            dist[i][k] = updated;
            dist[k][i] = updated;
        }

        if let Some(absorbed) = clusters[j].take() {
            if let Some(cluster) = clusters[i].as_mut() {
                cluster.members.extend(absorbed.members);
            }
        }
        merges.push(MergeStep {
            left: i,
            right: j,
            cost: (cost.max(0.0) * 2.0).sqrt(),
            size: merged_size,
        });
        active -= 1;
    }

    // Number the surviving clusters by their earliest row, so ids only depend
    // on input order.
    let mut survivors: Vec<(usize, Vec<usize>)> = clusters
        .into_iter()
        .flatten()
        .map(|c| {
            let first = c.members.iter().copied().min().unwrap_or(usize::MAX);
            (first, c.members)
        })
        .collect();
    survivors.sort_by_key(|(first, _)| *first);

    let mut assignments = vec![0usize; n];
    for (id, (_, members)) in survivors.into_iter().enumerate() {
        for member in members {
            assignments[member] = id;
        }
    }

    debug!(points = n, merges = merges.len(), "ward clustering complete");
    Ok((assignments, merges))
}

/// Tier per cluster id, ranked by cluster mean descending: the cluster with
/// the highest mean score is Strong and the lowest is Weak, regardless of the
/// raw cluster id order.
pub fn rank_tiers(cluster_means: &[f64]) -> Vec<PerformanceTier> {
    let mut order: Vec<usize> = (0..cluster_means.len()).collect();
    order.sort_by(|&a, &b| {
        cluster_means[b]
            .partial_cmp(&cluster_means[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut tiers = vec![PerformanceTier::Weak; cluster_means.len()];
    for (rank, &cluster_id) in order.iter().enumerate() {
        tiers[cluster_id] = match rank {
            0 => PerformanceTier::Strong,
            1 => PerformanceTier::Moderate,
            _ => PerformanceTier::Weak,
        };
    }
    tiers
}

/// Fit the full scale + cluster + rank pipeline over one score column.
///
/// Without `split_evaluation` the scaler and Ward model are fit on every row.
/// With it, every fifth row is held out: the scaler and model fit on the
/// remaining rows, and held-out rows are standardized with the train scaler
/// and assigned to the fitted cluster with the nearest mean, so the final
/// report still covers every student.
pub fn fit_performance_clusters(
    scores: &[f64],
    split_evaluation: bool,
) -> Result<(ClusterModel, Vec<MergeStep>)> {
    if scores.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::Clustering(
            "non-finite performance score; a student has no usable exam scores".to_string(),
        ));
    }

    let train_rows: Vec<usize> = if split_evaluation {
        (0..scores.len()).filter(|i| i % 5 != 4).collect()
    } else {
        (0..scores.len()).collect()
    };
    let train_values: Vec<f64> = train_rows.iter().map(|&i| scores[i]).collect();

    let scaler = Scaler::fit(&train_values);
    let scaled_train: Vec<f64> = train_values.iter().map(|&v| scaler.transform(v)).collect();
    let (train_assignments, merges) = ward_cluster(&scaled_train, N_CLUSTERS)?;

    // Raw-score mean per cluster, over the rows the model was fit on
    let mut sums = vec![0.0f64; N_CLUSTERS];
    let mut counts = vec![0usize; N_CLUSTERS];
    for (pos, &cluster) in train_assignments.iter().enumerate() {
        sums[cluster] += train_values[pos];
        counts[cluster] += 1;
    }
    let cluster_means: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(&sum, &count)| if count == 0 { f64::NAN } else { sum / count as f64 })
        .collect();
    let tiers = rank_tiers(&cluster_means);

    let mut assignments = vec![usize::MAX; scores.len()];
    for (pos, &row) in train_rows.iter().enumerate() {
        assignments[row] = train_assignments[pos];
    }
    for (row, slot) in assignments.iter_mut().enumerate() {
        if *slot == usize::MAX {
            *slot = nearest_cluster(scaler.transform(scores[row]), &cluster_means, &scaler);
        }
    }

    let model = ClusterModel {
        n_clusters: N_CLUSTERS,
        linkage: "ward".to_string(),
        metric: "euclidean".to_string(),
        scaler_mean: scaler.mean,
        scaler_std: scaler.std,
        cluster_means,
        tiers,
        assignments,
    };
    Ok((model, merges))
}

fn nearest_cluster(scaled_value: f64, cluster_means: &[f64], scaler: &Scaler) -> usize {
    let mut best = 0usize;
    let mut best_dist = f64::INFINITY;
    for (id, &mean) in cluster_means.iter().enumerate() {
        if !mean.is_finite() {
            continue;
        }
        let d = (scaled_value - scaler.transform(mean)).abs();
        if d < best_dist {
            best_dist = d;
            best = id;
        }
    }
    best
}
