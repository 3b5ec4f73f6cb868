//! Transformation stage: canonical Grade rename, subject-keyword column
//! selection and grouping, numeric matrix reshaping.

use tracing::{info, warn};

use crate::config::{self, PipelineConfig, GRADE_COLUMN};
use crate::error::{PipelineError, Result};
use crate::models::{FeatureGrouping, Subject};
use crate::table::{format_numeric, parse_numeric, Table};

/// Run transformation against the persisted prepared artifact; persists the
/// reshaped numeric matrix and the subject grouping.
pub fn run(config: &PipelineConfig) -> Result<(Table, FeatureGrouping)> {
    let paths = config.artifacts();
    let mut table = Table::from_csv(&paths.prepared_data)?;
    info!(rows = table.n_rows(), "read prepared data");

    if !table.rename_column(&config.cohort_column, GRADE_COLUMN)
        && !table.has_column(GRADE_COLUMN)
    {
        return Err(PipelineError::Schema(format!(
            "cohort column '{}' not found in prepared data",
            config.cohort_column
        )));
    }

    let grouping = group_subject_columns(table.headers());
    for subject in Subject::ALL {
        let columns = grouping.columns(subject);
        if columns.is_empty() {
            warn!(
                subject = subject.keyword(),
                "no columns match this subject keyword; its per-subject outputs will be skipped"
            );
        } else {
            info!(subject = subject.keyword(), columns = columns.len(), "grouped features");
        }
    }

    let matrix = reshape(&table, &grouping)?;
    info!(
        rows = matrix.n_rows(),
        columns = matrix.headers().len(),
        "reshaped exam matrix"
    );

    table.to_csv(&paths.prepared_data)?;
    matrix.to_csv(&paths.reshaped_data)?;
    config::save_json(&paths.feature_groups, &grouping)?;
    info!(path = %paths.feature_groups.display(), "feature grouping persisted");

    Ok((matrix, grouping))
}

/// Partition headers into subject groups by case-sensitive substring match,
/// preserving declaration order. A column joins the first subject whose
/// keyword it contains.
pub fn group_subject_columns(headers: &[String]) -> FeatureGrouping {
    let mut grouping = FeatureGrouping::default();
    for name in headers {
        for subject in Subject::ALL {
            if name.contains(subject.keyword()) {
                match subject {
                    Subject::Math => grouping.math.push(name.clone()),
                    Subject::Science => grouping.science.push(name.clone()),
                    Subject::English => grouping.english.push(name.clone()),
                }
                break;
            }
        }
    }
    grouping
}

/// Every subject column in declaration order; this is the working feature set
/// the trend and clustering stages iterate over.
pub fn subject_columns(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .filter(|name| {
            Subject::ALL
                .iter()
                .any(|subject| name.contains(subject.keyword()))
        })
        .cloned()
        .collect()
}

/// Flat numeric matrix over the subject columns: same rows, same column
/// order, every cell coerced to a float or missing.
fn reshape(table: &Table, grouping: &FeatureGrouping) -> Result<Table> {
    let columns = subject_columns(table.headers());
    let total_grouped = grouping.math.len() + grouping.science.len() + grouping.english.len();
    debug_assert_eq!(columns.len(), total_grouped);

    let selected = table.select(&columns)?;
    let mut matrix = Table::new(columns.clone());
    for row in selected.rows() {
        let coerced = row
            .iter()
            .map(|cell| match parse_numeric(cell) {
                Some(value) => format_numeric(value),
                None => String::new(),
            })
            .collect();
        matrix.push_row(coerced)?;
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn groups_follow_case_sensitive_keywords() {
        let grouping = group_subject_columns(&headers(&[
            "Grade",
            "Math exam 1",
            "Science exam 1",
            "English exam 1",
            "Math exam 2",
            "math notes", // lowercase, must not match
        ]));
        assert_eq!(grouping.math, vec!["Math exam 1", "Math exam 2"]);
        assert_eq!(grouping.science, vec!["Science exam 1"]);
        assert_eq!(grouping.english, vec!["English exam 1"]);
    }

    #[test]
    fn missing_subject_yields_empty_group_not_error() {
        let grouping = group_subject_columns(&headers(&["Grade", "Math exam 1", "English exam 1"]));
        assert!(grouping.science.is_empty());
    }

    #[test]
    fn reshape_preserves_rows_and_column_order() {
        let mut table = Table::new(headers(&["Grade", "Math exam 1", "English exam 1"]));
        table
            .push_row(vec!["10".into(), "60".into(), "n/a".into()])
            .expect("row");
        table
            .push_row(vec!["10".into(), "70".into(), "75".into()])
            .expect("row");

        let grouping = group_subject_columns(table.headers());
        let matrix = reshape(&table, &grouping).expect("reshape");

        assert_eq!(matrix.n_rows(), 2);
        assert_eq!(matrix.headers(), ["Math exam 1", "English exam 1"]);
        // Unparsable cells become missing, not an error
        assert_eq!(matrix.rows()[0], vec!["60", ""]);
        assert_eq!(matrix.rows()[1], vec!["70", "75"]);
    }

    #[test]
    fn subject_columns_keep_declaration_order() {
        let columns = subject_columns(&headers(&[
            "English exam 1",
            "Grade",
            "Math exam 1",
            "Science exam 1",
        ]));
        assert_eq!(columns, vec!["English exam 1", "Math exam 1", "Science exam 1"]);
    }
}
