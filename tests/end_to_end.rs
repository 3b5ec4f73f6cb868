//! Full-pipeline scenarios over a scratch artifact directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use cohort_performance_pipeline::config::{CohortSelector, PipelineConfig};
use cohort_performance_pipeline::models::ClusterModel;
use cohort_performance_pipeline::table::{round2, Table};
use cohort_performance_pipeline::{config, pipeline};

const COHORT_COLUMN: &str = "Current Year (17/18)";

/// Nine exam columns (3 terms x 3 subjects) grouped by term, so column order
/// reads as a time series.
fn score_headers() -> Vec<String> {
    let mut headers = Vec::new();
    for term in 1..=3 {
        for subject in ["Math", "Science", "English"] {
            headers.push(format!("{subject} exam {term}"));
        }
    }
    headers
}

fn write_dataset(dir: &Path, rows: &[(&str, [f64; 9])]) -> PathBuf {
    let path = dir.join("students.csv");
    let mut file = std::fs::File::create(&path).expect("create dataset");
    let mut header = vec!["Name".to_string(), COHORT_COLUMN.to_string()];
    header.extend(score_headers());
    writeln!(file, "{}", header.join(",")).expect("header");
    for (name, scores) in rows {
        let cells: Vec<String> = scores.iter().map(|s| s.to_string()).collect();
        writeln!(file, "{name},10,{}", cells.join(",")).expect("row");
    }
    path
}

/// Ten students in three well-separated performance bands, with improving,
/// declining, and flat score shapes mixed in.
fn ten_students() -> Vec<(&'static str, [f64; 9])> {
    vec![
        ("Avery", [85.0, 85.0, 85.0, 90.0, 90.0, 90.0, 95.0, 95.0, 95.0]),
        ("Jules", [95.0, 95.0, 95.0, 90.0, 90.0, 90.0, 85.0, 85.0, 85.0]),
        ("Kiara", [92.0, 92.0, 92.0, 92.0, 92.0, 92.0, 92.0, 92.0, 92.0]),
        ("Noah", [60.0, 60.0, 60.0, 65.0, 65.0, 65.0, 70.0, 70.0, 70.0]),
        ("Mina", [70.0, 70.0, 70.0, 65.0, 65.0, 65.0, 60.0, 60.0, 60.0]),
        ("Omar", [66.0, 66.0, 66.0, 66.0, 66.0, 66.0, 66.0, 66.0, 66.0]),
        ("Lena", [63.0, 64.0, 65.0, 64.0, 65.0, 66.0, 65.0, 66.0, 67.0]),
        ("Theo", [30.0, 30.0, 30.0, 35.0, 35.0, 35.0, 40.0, 40.0, 40.0]),
        ("Ruby", [40.0, 40.0, 40.0, 35.0, 35.0, 35.0, 30.0, 30.0, 30.0]),
        ("Sam", [35.0, 35.0, 35.0, 35.0, 35.0, 35.0, 35.0, 35.0, 35.0]),
    ]
}

fn run_pipeline(dir: &Path, rows: &[(&str, [f64; 9])]) -> (PipelineConfig, Table) {
    let data = write_dataset(dir, rows);
    let config = PipelineConfig::new(data, dir.join("artifacts"));
    let final_data = pipeline::run(&config).expect("pipeline run");
    (config, final_data)
}

#[test]
fn ten_student_scenario_produces_the_expected_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, final_data) = run_pipeline(dir.path(), &ten_students());

    assert_eq!(final_data.n_rows(), 10);

    for cell in final_data.column("Performance").expect("Performance column") {
        assert!(
            ["Strong", "Moderate", "Weak"].contains(&cell),
            "unexpected tier '{cell}'"
        );
    }

    // Overall Performance is the row-wise mean of the 9 scores, 2 decimals
    let overall = final_data
        .numeric_column("Overall Performance")
        .expect("Overall Performance column");
    for (row, (_, scores)) in ten_students().iter().enumerate() {
        let expected = round2(scores.iter().sum::<f64>() / 9.0);
        assert_eq!(overall[row], Some(expected), "row {row}");
    }
}

#[test]
fn tiers_follow_the_performance_bands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, final_data) = run_pipeline(dir.path(), &ten_students());

    let tiers = final_data.column("Performance").expect("tiers");
    for row in 0..3 {
        assert_eq!(tiers[row], "Strong", "row {row}");
    }
    for row in 3..7 {
        assert_eq!(tiers[row], "Moderate", "row {row}");
    }
    for row in 7..10 {
        assert_eq!(tiers[row], "Weak", "row {row}");
    }
}

#[test]
fn improvement_statuses_match_score_shapes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, final_data) = run_pipeline(dir.path(), &ten_students());

    let statuses = final_data
        .column("Improvement Status")
        .expect("Improvement Status column");
    assert_eq!(statuses[0], "Improving"); // Avery climbs each term
    assert_eq!(statuses[1], "Declining"); // Jules slides each term
    assert_eq!(statuses[2], "Stable"); // Kiara is flat
}

#[test]
fn term_averages_cover_the_matched_triples() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, final_data) = run_pipeline(dir.path(), &ten_students());

    for term in 1..=3 {
        let column = format!("Term exam {term}");
        assert!(final_data.has_column(&column), "missing {column}");
    }
    // Avery term 1: (85 + 85 + 85) / 3
    let term1 = final_data.numeric_column("Term exam 1").expect("term 1");
    assert_eq!(term1[0], Some(85.0));
}

#[test]
fn all_artifacts_exist_after_a_successful_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, _) = run_pipeline(dir.path(), &ten_students());
    let paths = config.artifacts();

    for path in [
        &paths.raw_data,
        &paths.prepared_data,
        &paths.preparation_manifest,
        &paths.reshaped_data,
        &paths.feature_groups,
        &paths.model,
        &paths.final_data,
    ] {
        assert!(path.exists(), "missing artifact {}", path.display());
    }

    let model: ClusterModel = config::load_json(&paths.model).expect("model loads");
    assert_eq!(model.n_clusters, 3);
    assert_eq!(model.linkage, "ward");
    assert_eq!(model.assignments.len(), 10);
}

#[test]
fn reruns_are_deterministic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, _) = run_pipeline(dir.path(), &ten_students());
    let first = std::fs::read_to_string(&config.artifacts().final_data).expect("first");

    let final_again = pipeline::run(&config).expect("second run");
    let second = std::fs::read_to_string(&config.artifacts().final_data).expect("second");
    assert_eq!(first, second);
    assert_eq!(final_again.n_rows(), 10);
}

#[test]
fn missing_science_columns_skip_gracefully() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("students.csv");
    let mut file = std::fs::File::create(&path).expect("create dataset");
    writeln!(
        file,
        "Name,{COHORT_COLUMN},Math exam 1,English exam 1,Math exam 2,English exam 2"
    )
    .expect("header");
    for (name, scores) in [
        ("Avery", [90.0, 92.0, 94.0, 96.0]),
        ("Jules", [60.0, 62.0, 64.0, 66.0]),
        ("Kiara", [30.0, 32.0, 34.0, 36.0]),
        ("Noah", [88.0, 90.0, 92.0, 94.0]),
        ("Mina", [58.0, 60.0, 62.0, 64.0]),
        ("Omar", [28.0, 30.0, 32.0, 34.0]),
    ] {
        let cells: Vec<String> = scores.iter().map(|s| s.to_string()).collect();
        writeln!(file, "{name},10,{}", cells.join(",")).expect("row");
    }

    let config = PipelineConfig::new(path, dir.path().join("artifacts"));
    let final_data = pipeline::run(&config).expect("pipeline tolerates an empty group");

    assert!(!final_data.has_column("Science Performance"));
    assert!(!final_data.has_column("Science Improvement Status"));
    assert!(final_data.has_column("Performance"));
    assert!(final_data.has_column("Math Performance"));
    assert!(final_data.has_column("English Performance"));
}

#[test]
fn cohort_selector_limits_the_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("students.csv");
    let mut file = std::fs::File::create(&path).expect("create dataset");
    let mut header = vec!["Name".to_string(), COHORT_COLUMN.to_string()];
    header.extend(score_headers());
    writeln!(file, "{}", header.join(",")).expect("header");
    for (i, (name, scores)) in ten_students().iter().enumerate() {
        let cohort = if i < 6 { "10" } else { "11" };
        let cells: Vec<String> = scores.iter().map(|s| s.to_string()).collect();
        writeln!(file, "{name},{cohort},{}", cells.join(",")).expect("row");
    }

    let mut config = PipelineConfig::new(path, dir.path().join("artifacts"));
    config.selector = CohortSelector::Cohort("10".to_string());
    let final_data = pipeline::run(&config).expect("pipeline run");

    assert_eq!(final_data.n_rows(), 6);
    // Ids keep their position in the full table
    assert_eq!(
        final_data.column("Id").expect("Id column"),
        vec!["0", "1", "2", "3", "4", "5"]
    );
    assert_eq!(final_data.column("Grade").expect("Grade column")[0], "10");
}

#[test]
fn split_evaluation_still_reports_every_student() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = write_dataset(dir.path(), &ten_students());
    let mut config = PipelineConfig::new(data, dir.path().join("artifacts"));
    config.split_evaluation = true;
    config.emit_dendrogram = true;

    let final_data = pipeline::run(&config).expect("pipeline run");
    assert_eq!(final_data.n_rows(), 10);
    for cell in final_data.column("Performance").expect("tiers") {
        assert!(["Strong", "Moderate", "Weak"].contains(&cell));
    }
    assert!(config.artifacts().dendrogram.exists());
}

#[test]
fn messy_cells_are_imputed_before_clustering() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("students.csv");
    let mut file = std::fs::File::create(&path).expect("create dataset");
    writeln!(
        file,
        "Name,{COHORT_COLUMN},Math exam 1,Math exam 2,Math exam 3"
    )
    .expect("header");
    // Two unparsable cells in Math exam 2 coerce to missing and take the median
    writeln!(file, "Avery,10,90,absent,94").expect("row");
    writeln!(file, "Jules,10,60,62,64").expect("row");
    writeln!(file, "Kiara,10,30,32,34").expect("row");
    writeln!(file, "Noah,10,88,n/a,92").expect("row");
    writeln!(file, "Mina,10,58,60,62").expect("row");

    let config = PipelineConfig::new(path, dir.path().join("artifacts"));
    let final_data = pipeline::run(&config).expect("pipeline run");

    // Median of the remaining {62, 32, 60} = 60 fills both holes
    let exam2 = final_data
        .numeric_column("Math exam 2")
        .expect("Math exam 2");
    assert_eq!(exam2[0], Some(60.0));
    assert_eq!(exam2[3], Some(60.0));
}
