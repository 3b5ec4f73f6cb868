//! Final report assembly: trends, aggregate performance, clustering tiers,
//! term averages, and the markdown summary.

use std::fmt::Write as _;

use chrono::Utc;
use tracing::{info, warn};

use crate::cluster;
use crate::config::{self, PipelineConfig, GRADE_COLUMN, ID_COLUMN};
use crate::error::{PipelineError, Result};
use crate::models::{FeatureGrouping, PerformanceTier, Subject, TierCounts};
use crate::table::{format_numeric, round2, Table};
use crate::trend;

/// Run the trend/clustering stage over the persisted reshaped matrix and
/// write `model.json` and `final_data.csv`.
pub fn run(config: &PipelineConfig) -> Result<Table> {
    let paths = config.artifacts();
    let matrix = Table::from_csv(&paths.reshaped_data)?;
    let grouping: FeatureGrouping = config::load_json(&paths.feature_groups)?;
    let prepared = Table::from_csv(&paths.prepared_data)?;
    info!(rows = matrix.n_rows(), "read reshaped matrix");

    let mut final_data = matrix.clone();
    append_trend_columns(&mut final_data, &matrix, &grouping)?;
    append_overall_performance(&mut final_data, &matrix)?;

    let overall_scores = final_data
        .numeric_column("Overall Performance")
        .ok_or_else(|| PipelineError::Schema("missing 'Overall Performance' column".to_string()))?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect::<Vec<f64>>();
    let (model, merges) =
        cluster::fit_performance_clusters(&overall_scores, config.split_evaluation)?;

    let n_rows = final_data.n_rows();
    final_data.set_column(
        "Cluster",
        model.assignments.iter().map(|c| c.to_string()).collect(),
    )?;
    final_data.set_column(
        "Performance",
        (0..n_rows).map(|row| model.tier_of_row(row).to_string()).collect(),
    )?;

    carry_identity_columns(&mut final_data, &prepared)?;
    append_term_averages(&mut final_data, &grouping)?;
    append_subject_performance(&mut final_data, &matrix, &grouping, config)?;

    config::save_json(&paths.model, &model)?;
    if config.emit_dendrogram {
        config::save_json(&paths.dendrogram, &merges)?;
        info!(path = %paths.dendrogram.display(), "merge history persisted");
    }
    final_data.to_csv(&paths.final_data)?;
    info!(path = %paths.final_data.display(), "final report persisted");

    Ok(final_data)
}

/// Overall and per-subject improvement statuses, from the least-squares trend
/// of each student's scores in column order. Empty subject groups are skipped.
fn append_trend_columns(
    final_data: &mut Table,
    matrix: &Table,
    grouping: &FeatureGrouping,
) -> Result<()> {
    let all_columns: Vec<String> = matrix.headers().to_vec();
    let statuses = trend_statuses(matrix, &all_columns)?;
    final_data.set_column("Improvement Status", statuses)?;

    for subject in Subject::ALL {
        let columns = grouping.columns(subject);
        if columns.is_empty() {
            warn!(
                subject = subject.keyword(),
                "empty subject group; skipping its improvement status"
            );
            continue;
        }
        let statuses = trend_statuses(matrix, columns)?;
        final_data.set_column(&format!("{} Improvement Status", subject.keyword()), statuses)?;
    }
    Ok(())
}

fn trend_statuses(matrix: &Table, columns: &[String]) -> Result<Vec<String>> {
    let series = numeric_rows(matrix, columns)?;
    Ok(series
        .iter()
        .map(|cells| trend::improvement_status(trend::trend_of_row(cells)).to_string())
        .collect())
}

/// Mean of each student's non-missing scores across the whole feature set,
/// rounded to two decimals. The rounded value is what later gets clustered.
fn append_overall_performance(final_data: &mut Table, matrix: &Table) -> Result<()> {
    let all_columns: Vec<String> = matrix.headers().to_vec();
    let means = row_means(matrix, &all_columns)?;
    final_data.set_column(
        "Overall Performance",
        means
            .iter()
            .map(|m| m.map(|v| format_numeric(round2(v))).unwrap_or_default())
            .collect(),
    )?;
    Ok(())
}

/// Grade and Id travel with the final report, read back from the prepared
/// artifact (rows are in the same order throughout the pipeline).
fn carry_identity_columns(final_data: &mut Table, prepared: &Table) -> Result<()> {
    if prepared.n_rows() != final_data.n_rows() {
        return Err(PipelineError::Schema(format!(
            "prepared table has {} rows but the reshaped matrix has {}",
            prepared.n_rows(),
            final_data.n_rows()
        )));
    }
    for name in [GRADE_COLUMN, ID_COLUMN] {
        match prepared.column(name) {
            Some(cells) => {
                final_data.set_column(name, cells.iter().map(|c| c.to_string()).collect())?
            }
            None => {
                return Err(PipelineError::Schema(format!(
                    "prepared data is missing the '{name}' column"
                )))
            }
        }
    }
    Ok(())
}

/// One `Term N` column per (math, science, english) triple sharing a term
/// suffix: the mean of the three scores, rounded to two decimals. A math
/// column with no matching counterparts is skipped with a warning.
fn append_term_averages(final_data: &mut Table, grouping: &FeatureGrouping) -> Result<()> {
    for math_column in &grouping.math {
        let suffix = math_column.replace(Subject::Math.keyword(), "");
        let science = grouping
            .science
            .iter()
            .find(|name| name.replace(Subject::Science.keyword(), "") == suffix);
        let english = grouping
            .english
            .iter()
            .find(|name| name.replace(Subject::English.keyword(), "") == suffix);

        let (science, english) = match (science, english) {
            (Some(s), Some(e)) => (s.clone(), e.clone()),
            _ => {
                warn!(column = %math_column, "no matching term triple; skipping term average");
                continue;
            }
        };

        let triple = [math_column.clone(), science, english];
        let rows = numeric_rows(final_data, &triple)?;
        let term_column = math_column.replace(Subject::Math.keyword(), "Term");
        let values = rows
            .iter()
            .map(|cells| {
                // All three scores must be present for a term average
                let present: Option<Vec<f64>> = cells.iter().copied().collect();
                present
                    .map(|v| format_numeric(round2(v.iter().sum::<f64>() / 3.0)))
                    .unwrap_or_default()
            })
            .collect();
        final_data.set_column(&term_column, values)?;
    }
    Ok(())
}

/// Per-subject aggregate scores and independent scale+cluster+label passes.
fn append_subject_performance(
    final_data: &mut Table,
    matrix: &Table,
    grouping: &FeatureGrouping,
    config: &PipelineConfig,
) -> Result<()> {
    for subject in Subject::ALL {
        let columns = grouping.columns(subject);
        if columns.is_empty() {
            warn!(
                subject = subject.keyword(),
                "empty subject group; skipping its performance clustering"
            );
            continue;
        }

        let means = row_means(matrix, columns)?;
        let overall_column = format!("Overall {} Performance", subject.keyword());
        final_data.set_column(
            &overall_column,
            means
                .iter()
                .map(|m| m.map(|v| format_numeric(round2(v))).unwrap_or_default())
                .collect(),
        )?;

        let scores: Vec<f64> = means.iter().map(|m| m.map(round2).unwrap_or(f64::NAN)).collect();
        let (model, _) = cluster::fit_performance_clusters(&scores, config.split_evaluation)
            .map_err(|err| {
                PipelineError::Clustering(format!("{} clustering failed: {err}", subject.keyword()))
            })?;
        let n_rows = final_data.n_rows();
        final_data.set_column(
            &format!("{} Performance", subject.keyword()),
            (0..n_rows).map(|row| model.tier_of_row(row).to_string()).collect(),
        )?;
    }
    Ok(())
}

/// Per-row numeric cells for the named columns, in the given column order.
fn numeric_rows(table: &Table, columns: &[String]) -> Result<Vec<Vec<Option<f64>>>> {
    let mut per_column = Vec::with_capacity(columns.len());
    for name in columns {
        let values = table
            .numeric_column(name)
            .ok_or_else(|| PipelineError::Schema(format!("unknown column '{name}'")))?;
        per_column.push(values);
    }

    let n_rows = table.n_rows();
    let mut rows = vec![Vec::with_capacity(columns.len()); n_rows];
    for values in per_column {
        for (row, value) in values.into_iter().enumerate() {
            rows[row].push(value);
        }
    }
    Ok(rows)
}

/// Row-wise mean of the non-missing cells; None when the whole row is missing.
fn row_means(table: &Table, columns: &[String]) -> Result<Vec<Option<f64>>> {
    Ok(numeric_rows(table, columns)?
        .iter()
        .map(|cells| {
            let present: Vec<f64> = cells.iter().flatten().copied().collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        })
        .collect())
}

/// Tier distribution of a label column.
pub fn tier_counts(table: &Table, column: &str) -> Option<TierCounts> {
    let cells = table.column(column)?;
    let mut counts = TierCounts {
        strong: 0,
        moderate: 0,
        weak: 0,
    };
    for cell in cells {
        match cell {
            c if c == PerformanceTier::Strong.as_str() => counts.strong += 1,
            c if c == PerformanceTier::Moderate.as_str() => counts.moderate += 1,
            c if c == PerformanceTier::Weak.as_str() => counts.weak += 1,
            _ => {}
        }
    }
    Some(counts)
}

/// Markdown summary of a final report, optionally focused on one student id.
pub fn build_report(final_data: &Table, student_id: Option<usize>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Cohort Performance Report");
    let _ = writeln!(
        output,
        "Generated {} over {} students",
        Utc::now().date_naive(),
        final_data.n_rows()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Performance Tiers");

    if let Some(counts) = tier_counts(final_data, "Performance") {
        let _ = writeln!(
            output,
            "- Overall: {} Strong, {} Moderate, {} Weak",
            counts.strong, counts.moderate, counts.weak
        );
    }
    for subject in Subject::ALL {
        let column = format!("{} Performance", subject.keyword());
        if final_data.has_column(&column) {
            if let Some(counts) = tier_counts(final_data, &column) {
                let _ = writeln!(
                    output,
                    "- {}: {} Strong, {} Moderate, {} Weak",
                    subject.keyword(),
                    counts.strong,
                    counts.moderate,
                    counts.weak
                );
            }
        }
    }

    let improving = final_data
        .column("Improvement Status")
        .map(|cells| cells.into_iter().filter(|c| *c == "Improving").count())
        .unwrap_or(0);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Trends");
    let _ = writeln!(
        output,
        "{improving} of {} students show an improving overall trend.",
        final_data.n_rows()
    );

    if let Some(id) = student_id {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Student {id}");
        match find_student_row(final_data, id) {
            Some(row) => {
                for (header, cell) in final_data.headers().iter().zip(&final_data.rows()[row]) {
                    let _ = writeln!(output, "- {header}: {cell}");
                }
            }
            None => {
                let _ = writeln!(output, "No student with id {id} in the final report.");
            }
        }
    }

    output
}

fn find_student_row(final_data: &Table, id: usize) -> Option<usize> {
    let cells = final_data.column(ID_COLUMN)?;
    cells.iter().position(|cell| *cell == id.to_string())
}
