use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cohort_performance_pipeline::config::{CohortSelector, PipelineConfig};
use cohort_performance_pipeline::{ingest, pipeline, prepare, report, table, transform};

#[derive(Parser)]
#[command(name = "cohort-performance-pipeline")]
#[command(about = "Student exam performance trend and clustering pipeline", long_about = None)]
struct Cli {
    /// Directory stage artifacts are written under
    #[arg(long, global = true, default_value = "artifacts")]
    artifacts: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
#[command(group(
    ArgGroup::new("scope")
        .args(["cohort", "enrollment"])
        .multiple(false)
))]
struct SourceArgs {
    /// Source CSV with one row per student
    #[arg(long)]
    data: PathBuf,

    /// Keep only rows with this cohort label
    #[arg(long)]
    cohort: Option<String>,

    /// Keep only rows sharing the cohort of this enrollment id
    #[arg(long)]
    enrollment: Option<usize>,

    /// Name of the cohort column in the source data
    #[arg(long, default_value = "Current Year (17/18)")]
    cohort_column: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: ingest, prepare, transform, cluster
    Run {
        #[command(flatten)]
        source: SourceArgs,
        /// Fit the scaler and cluster model on a held-in train split only
        #[arg(long)]
        split_evaluation: bool,
        /// Persist the Ward merge history for external dendrogram plotting
        #[arg(long)]
        emit_dendrogram: bool,
    },
    /// Ingest the source CSV into the raw artifact
    Ingest {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Prepare the raw artifact: coercion, classification, imputation
    Prepare,
    /// Transform the prepared artifact into the reshaped exam matrix
    Transform,
    /// Cluster the reshaped matrix and write the final report artifact
    Cluster {
        #[arg(long)]
        split_evaluation: bool,
        #[arg(long)]
        emit_dendrogram: bool,
    },
    /// Summarize the final report as markdown
    Report {
        /// Focus the report on one student id
        #[arg(long)]
        id: Option<usize>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn selector(cohort: Option<String>, enrollment: Option<usize>) -> CohortSelector {
    match (cohort, enrollment) {
        (Some(label), _) => CohortSelector::Cohort(label),
        (None, Some(id)) => CohortSelector::Enrollment(id),
        (None, None) => CohortSelector::All,
    }
}

fn source_config(artifacts: PathBuf, source: SourceArgs) -> PipelineConfig {
    let mut config = PipelineConfig::new(source.data, artifacts);
    config.cohort_column = source.cohort_column;
    config.selector = selector(source.cohort, source.enrollment);
    config
}

/// Stage commands after ingestion only touch the artifact directory, so the
/// source path in the config is unused.
fn artifact_config(artifacts: PathBuf) -> PipelineConfig {
    PipelineConfig::new(PathBuf::new(), artifacts)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cohort_performance_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let artifacts = cli.artifacts;

    match cli.command {
        Commands::Run {
            source,
            split_evaluation,
            emit_dendrogram,
        } => {
            let mut config = source_config(artifacts, source);
            config.split_evaluation = split_evaluation;
            config.emit_dendrogram = emit_dendrogram;
            let final_data = pipeline::run(&config).context("pipeline run failed")?;
            println!(
                "Pipeline complete: {} students written to {}.",
                final_data.n_rows(),
                config.artifacts().final_data.display()
            );
        }
        Commands::Ingest { source } => {
            let config = source_config(artifacts, source);
            let subset = ingest::run(&config)?;
            println!(
                "Ingested {} rows to {}.",
                subset.n_rows(),
                config.artifacts().raw_data.display()
            );
        }
        Commands::Prepare => {
            let config = artifact_config(artifacts);
            let (_, manifest) = prepare::run(&config)?;
            println!(
                "Prepared data: {} numerical and {} categorical columns.",
                manifest.numerical_features.len(),
                manifest.categorical_features.len()
            );
        }
        Commands::Transform => {
            let config = artifact_config(artifacts);
            let (matrix, _) = transform::run(&config)?;
            println!(
                "Reshaped exam matrix: {} rows x {} columns.",
                matrix.n_rows(),
                matrix.headers().len()
            );
        }
        Commands::Cluster {
            split_evaluation,
            emit_dendrogram,
        } => {
            let mut config = artifact_config(artifacts);
            config.split_evaluation = split_evaluation;
            config.emit_dendrogram = emit_dendrogram;
            let final_data = report::run(&config)?;
            println!(
                "Clustered {} students; final report at {}.",
                final_data.n_rows(),
                config.artifacts().final_data.display()
            );
        }
        Commands::Report { id, out } => {
            let config = artifact_config(artifacts);
            let final_data = table::Table::from_csv(&config.artifacts().final_data)
                .context("final report artifact not found; run the pipeline first")?;
            let markdown = report::build_report(&final_data, id);
            std::fs::write(&out, markdown)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
