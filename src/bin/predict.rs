//! Loads trained artifacts and prints a next-day prediction per ticker.

use anyhow::{bail, Context, Result};
use clap::Parser;
use marketcast::config::PipelineConfig;
use marketcast::infrastructure::artifacts::ArtifactStore;
use marketcast::infrastructure::feature_csv;
use ndarray::s;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(author, version, about = "Predict the next day's percent change per ticker", long_about = None)]
struct Cli {
    /// Feature CSV produced by prepare_features
    #[arg(short, long, default_value = "data/features.csv")]
    features: PathBuf,

    /// Directory holding model and scaler artifacts
    #[arg(short, long, default_value = "data/models")]
    artifacts: PathBuf,

    /// Predict only this ticker instead of every configured one
    #[arg(short, long)]
    ticker: Option<String>,
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
    let tickers: Vec<String> = match &cli.ticker {
        Some(ticker) => vec![ticker.clone()],
        None => config.tickers.clone(),
    };

    let table = feature_csv::read_table(&cli.features, &config.schema_version)
        .context("Failed to read feature CSV")?;
    let dense = table.resolve_missing();
    if dense.len() < config.timesteps {
        bail!(
            "need at least {} feature rows, got {}",
            config.timesteps,
            dense.len()
        );
    }
    let tail = dense
        .values()
        .slice(s![dense.len() - config.timesteps.., ..]);

    let store = ArtifactStore::new(&cli.artifacts);
    let mut predicted = 0usize;
    for ticker in &tickers {
        // One ticker's broken artifacts must not block the others.
        let value = store
            .load_predictor(&config, ticker)
            .and_then(|fitted| fitted.predict_next(tail));
        match value {
            Ok(value) => {
                println!("\"{ticker}\": {value:.4}");
                predicted += 1;
            }
            Err(err) => error!(ticker, error = %err, "prediction failed"),
        }
    }

    if predicted == 0 {
        bail!("no ticker could be predicted");
    }
    Ok(())
}
