//! Trains one model per target ticker from the feature CSV and persists
//! the model/scaler artifacts.

use anyhow::{bail, Context, Result};
use clap::Parser;
use marketcast::application::trainer::PredictorTrainer;
use marketcast::config::PipelineConfig;
use marketcast::infrastructure::artifacts::ArtifactStore;
use marketcast::infrastructure::feature_csv;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(author, version, about = "Train next-day predictors from the feature table", long_about = None)]
struct Cli {
    /// Feature CSV produced by prepare_features
    #[arg(short, long, default_value = "data/features.csv")]
    features: PathBuf,

    /// Directory for model and scaler artifacts
    #[arg(short, long, default_value = "data/models")]
    artifacts: PathBuf,

    /// Train only this ticker instead of every configured one
    #[arg(short, long)]
    ticker: Option<String>,

    /// Override the configured epoch count
    #[arg(long)]
    epochs: Option<usize>,
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
    let epochs = cli.epochs.unwrap_or(config.model.epochs);
    let tickers: Vec<String> = match &cli.ticker {
        Some(ticker) => vec![ticker.clone()],
        None => config.tickers.clone(),
    };

    let table = feature_csv::read_table(&cli.features, &config.schema_version)
        .context("Failed to read feature CSV")?;
    let dense = table.resolve_missing();

    let trainer = PredictorTrainer::new(config.clone());
    let store = ArtifactStore::new(&cli.artifacts);

    let mut trained = 0usize;
    for ticker in &tickers {
        let (fitted, report) = match trainer.train(&dense, ticker, epochs) {
            Ok(result) => result,
            Err(err) => {
                error!(ticker, error = %err, "training failed");
                continue;
            }
        };
        store
            .save_model(ticker, &config.model_version, &fitted.net)
            .context("Failed to save model")?;
        if trained == 0 {
            // One scaler per run, shared across the tickers it trained.
            store
                .save_scaler(&fitted.scaler)
                .context("Failed to save scaler")?;
        }
        trained += 1;

        println!(
            "{ticker}: {} windows ({} train / {} val), final train loss {:.6}{}",
            report.windows,
            report.train_windows,
            report.val_windows,
            report.train_loss,
            match report.val_loss {
                Some(v) => format!(", val loss {v:.6}"),
                None => String::new(),
            }
        );
    }

    if trained == 0 {
        bail!("no ticker could be trained");
    }
    println!(
        "Saved {trained} model(s) and scaler to {}",
        cli.artifacts.display()
    );
    Ok(())
}
