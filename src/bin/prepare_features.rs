//! Flattens the stored snapshot history into the dense feature CSV.

use anyhow::{Context, Result};
use clap::Parser;
use marketcast::application::table_builder::FeatureTableBuilder;
use marketcast::config::PipelineConfig;
use marketcast::infrastructure::feature_csv;
use marketcast::infrastructure::snapshot_store::FsSnapshotStore;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Build the feature table from daily snapshots", long_about = None)]
struct Cli {
    /// Directory of YYYY-MM-DD.json snapshot documents
    #[arg(long, default_value = "data/snapshots")]
    snapshots: PathBuf,

    /// Output CSV path
    #[arg(short, long, default_value = "data/features.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env()?;
    let store = FsSnapshotStore::new(&cli.snapshots);

    let table = FeatureTableBuilder::new(&config)
        .build(&store)
        .context("Failed to assemble feature table")?;
    let dense = table.resolve_missing();

    if let Some(parent) = cli.output.parent() {
        std::fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    feature_csv::write_dense(&cli.output, &dense).context("Failed to write feature CSV")?;

    println!(
        "Wrote {} rows x {} columns to {}",
        dense.len(),
        dense.columns().len(),
        cli.output.display()
    );
    Ok(())
}
