//! Walk-forward backfill: one prediction record per historical date,
//! each trained only on the days before it.

use anyhow::{Context, Result};
use clap::Parser;
use marketcast::application::progressive::ProgressivePredictor;
use marketcast::config::PipelineConfig;
use marketcast::infrastructure::artifacts::ArtifactStore;
use marketcast::infrastructure::snapshot_store::FsSnapshotStore;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Generate walk-forward predictions over the full history", long_about = None)]
struct Cli {
    /// Directory of YYYY-MM-DD.json snapshot documents
    #[arg(long, default_value = "data/snapshots")]
    snapshots: PathBuf,

    /// Output directory for per-date prediction documents
    #[arg(short, long, default_value = "data/predictions")]
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

    let records = ProgressivePredictor::new(config)
        .run(&store)
        .context("Walk-forward run failed")?;

    let artifacts = ArtifactStore::new(&cli.output);
    for record in &records {
        artifacts
            .save_prediction(record)
            .context("Failed to write prediction record")?;
    }

    println!(
        "Wrote {} prediction record(s) to {}",
        records.len(),
        cli.output.display()
    );
    Ok(())
}
