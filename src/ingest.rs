//! Ingestion stage: load the source CSV, assign stable row ids, apply the
//! cohort selector, persist the raw subset.

use tracing::info;

use crate::config::{CohortSelector, PipelineConfig, ID_COLUMN};
use crate::error::{PipelineError, Result};
use crate::table::Table;

/// Run ingestion and persist `raw_data.csv`. Returns the persisted subset.
pub fn run(config: &PipelineConfig) -> Result<Table> {
    let mut table = Table::from_csv(&config.data_path).map_err(|err| {
        PipelineError::Ingestion(format!(
            "could not read source data at {}: {err}",
            config.data_path.display()
        ))
    })?;
    info!(
        rows = table.n_rows(),
        columns = table.headers().len(),
        "read source dataset"
    );

    clean_headers(&mut table);

    // Contiguous ids are assigned over the full table before any filtering,
    // so a row keeps its id no matter which cohort is selected.
    let ids: Vec<String> = (0..table.n_rows()).map(|i| i.to_string()).collect();
    table.set_column(ID_COLUMN, ids)?;

    let cohort_idx = table.column_index(&config.cohort_column).ok_or_else(|| {
        PipelineError::Ingestion(format!(
            "cohort column '{}' not found in source data",
            config.cohort_column
        ))
    })?;

    match &config.selector {
        CohortSelector::All => {}
        CohortSelector::Cohort(label) => {
            table.retain_rows(|row| row[cohort_idx] == *label);
            if table.n_rows() == 0 {
                return Err(PipelineError::Ingestion(format!(
                    "cohort '{label}' matched no rows"
                )));
            }
            info!(cohort = %label, rows = table.n_rows(), "filtered to cohort");
        }
        CohortSelector::Enrollment(enrollment) => {
            let cohort = table
                .rows()
                .get(*enrollment)
                .map(|row| row[cohort_idx].clone())
                .ok_or_else(|| {
                    PipelineError::Ingestion(format!(
                        "enrollment id {enrollment} is out of range ({} rows)",
                        table.n_rows()
                    ))
                })?;
            table.retain_rows(|row| row[cohort_idx] == cohort);
            info!(
                enrollment,
                cohort = %cohort,
                rows = table.n_rows(),
                "filtered to the enrollment's cohort"
            );
        }
    }

    let paths = config.artifacts();
    paths.ensure_dir()?;
    table.to_csv(&paths.raw_data)?;
    info!(path = %paths.raw_data.display(), "raw subset persisted");

    Ok(table)
}

/// The source dataset carries stray ` '` sequences in some column names;
/// strip them so keyword matching sees clean headers.
fn clean_headers(table: &mut Table) {
    let cleaned: Vec<(String, String)> = table
        .headers()
        .iter()
        .filter(|name| name.contains(" '"))
        .map(|name| (name.clone(), name.replace(" '", "")))
        .collect();
    for (from, to) in cleaned {
        table.rename_column(&from, &to);
    }
}
