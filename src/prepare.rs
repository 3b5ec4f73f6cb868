//! Preparation stage: missing-value detection, exam-score coercion,
//! numerical/categorical classification, median imputation.

use tracing::{debug, info};

use crate::config::{self, PipelineConfig, EXAM_MARKER};
use crate::error::Result;
use crate::models::PreparationManifest;
use crate::table::{format_numeric, parse_numeric, Table};

/// Run preparation against the persisted raw artifact; persists the prepared
/// table and the numerical/categorical manifest.
pub fn run(config: &PipelineConfig) -> Result<(Table, PreparationManifest)> {
    let paths = config.artifacts();
    let mut table = Table::from_csv(&paths.raw_data)?;
    info!(rows = table.n_rows(), "read raw data");

    let manifest = prepare_table(&mut table)?;

    table.to_csv(&paths.prepared_data)?;
    config::save_json(&paths.preparation_manifest, &manifest)?;
    info!(
        numerical = manifest.numerical_features.len(),
        categorical = manifest.categorical_features.len(),
        path = %paths.preparation_manifest.display(),
        "preparation manifest persisted"
    );

    Ok((table, manifest))
}

/// Clean and impute the table in place, returning the column classification.
pub fn prepare_table(table: &mut Table) -> Result<PreparationManifest> {
    let headers: Vec<String> = table.headers().to_vec();

    for name in &headers {
        let missing = missing_count(table, name);
        // Source-faithful threshold: a single missing value is not flagged
        if missing > 1 {
            let fraction = missing as f64 / table.n_rows().max(1) as f64;
            info!(column = %name, missing, fraction = format!("{fraction:.4}"), "missing values");
        }
    }

    // Exam columns get lenient numeric coercion: anything that does not parse
    // as a float becomes a missing cell.
    let exam_columns: Vec<String> = headers
        .iter()
        .filter(|name| name.contains(EXAM_MARKER))
        .cloned()
        .collect();
    debug!(?exam_columns, "coercing exam columns to numeric");
    for name in &exam_columns {
        let Some(idx) = table.column_index(name) else {
            continue;
        };
        for row in 0..table.n_rows() {
            let cell = table.rows()[row][idx].clone();
            let coerced = match parse_numeric(&cell) {
                Some(value) => format_numeric(value),
                None => String::new(),
            };
            if coerced != cell {
                table.set_cell(row, idx, coerced);
            }
        }
    }

    let mut numerical_features = Vec::new();
    let mut categorical_features = Vec::new();
    for name in &headers {
        if is_numerical(table, name) {
            numerical_features.push(name.clone());
        } else {
            categorical_features.push(name.clone());
        }
    }
    debug!(?numerical_features, ?categorical_features, "classified columns");

    for name in &numerical_features {
        if missing_count(table, name) > 1 {
            impute_median(table, name);
        }
    }
    info!("median imputation complete");

    Ok(PreparationManifest {
        numerical_features,
        categorical_features,
    })
}

fn missing_count(table: &Table, column: &str) -> usize {
    table
        .column(column)
        .map(|cells| cells.iter().filter(|c| c.trim().is_empty()).count())
        .unwrap_or(0)
}

/// A column is numerical when every non-missing cell parses as a float.
fn is_numerical(table: &Table, column: &str) -> bool {
    table
        .column(column)
        .map(|cells| {
            cells
                .iter()
                .filter(|c| !c.trim().is_empty())
                .all(|c| parse_numeric(c).is_some())
        })
        .unwrap_or(false)
}

fn impute_median(table: &mut Table, column: &str) {
    let values = match table.numeric_column(column) {
        Some(values) => values,
        None => return,
    };
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return;
    }
    let median = median_of(&mut present);

    let Some(idx) = table.column_index(column) else {
        return;
    };
    for (row, value) in values.iter().enumerate() {
        if value.is_none() {
            table.set_cell(row, idx, format_numeric(median));
        }
    }
    debug!(column, median, "imputed missing values");
}

/// Median of the given values; an even count averages the two middle values.
fn median_of(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}
