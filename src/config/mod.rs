//! Configuration for the marketcast pipeline.
//!
//! Everything the pipeline needs is carried explicitly in these structs
//! and passed into each component at construction time — tracked tickers,
//! tracked benchmarks, timesteps, target feature and model
//! hyper-parameters. No component reads ambient globals.

use anyhow::{Context, Result};
use std::env;

pub const SCHEMA_VERSION: &str = "1.0";
pub const MODEL_VERSION: &str = "v1";

/// Pipeline-wide configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tickers a feature row carries the full metric set for.
    pub tickers: Vec<String>,
    /// Benchmarks contributing a single close column each.
    pub benchmarks: Vec<String>,
    /// Window length: how many past days feed one prediction.
    pub timesteps: usize,
    /// Per-ticker field used as the regression target.
    pub target_feature: String,
    /// Feature scaling range, default [0, 1].
    pub scale_range: (f64, f64),
    pub model: ModelConfig,
    pub model_version: String,
    pub schema_version: String,
}

/// Network shape and training hyper-parameters.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub hidden_units: usize,
    pub dense_units: usize,
    pub dropout: f64,
    pub learning_rate: f64,
    /// Epochs for a full standalone training run.
    pub epochs: usize,
    /// Reduced epoch count used per date of a walk-forward backfill.
    pub backfill_epochs: usize,
    /// Fixing this makes weight init, dropout and shuffling repeatable.
    pub seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hidden_units: 50,
            dense_units: 25,
            dropout: 0.2,
            learning_rate: 1e-3,
            epochs: 50,
            backfill_epochs: 25,
            seed: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tickers: vec!["OKLO".to_string(), "RKLB".to_string()],
            benchmarks: vec![
                "SPY".to_string(),
                "VIXY".to_string(),
                "VIXM".to_string(),
                "VIX".to_string(),
            ],
            timesteps: 3,
            target_feature: "predicted_next_day_pct".to_string(),
            scale_range: (0.0, 1.0),
            model: ModelConfig::default(),
            model_version: MODEL_VERSION.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Loads the default configuration with environment overrides.
    /// `.env` is honoured when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let tickers = parse_list("MARKETCAST_TICKERS", &defaults.tickers);
        let benchmarks = parse_list("MARKETCAST_BENCHMARKS", &defaults.benchmarks);
        let timesteps = parse_usize("MARKETCAST_TIMESTEPS", defaults.timesteps)?;
        let target_feature = env::var("MARKETCAST_TARGET_FEATURE")
            .unwrap_or_else(|_| defaults.target_feature.clone());

        let model = ModelConfig {
            hidden_units: parse_usize("MARKETCAST_HIDDEN_UNITS", defaults.model.hidden_units)?,
            dense_units: parse_usize("MARKETCAST_DENSE_UNITS", defaults.model.dense_units)?,
            dropout: parse_f64("MARKETCAST_DROPOUT", defaults.model.dropout)?,
            learning_rate: parse_f64("MARKETCAST_LEARNING_RATE", defaults.model.learning_rate)?,
            epochs: parse_usize("MARKETCAST_EPOCHS", defaults.model.epochs)?,
            backfill_epochs: parse_usize(
                "MARKETCAST_BACKFILL_EPOCHS",
                defaults.model.backfill_epochs,
            )?,
            seed: match env::var("MARKETCAST_SEED") {
                Ok(s) => Some(
                    s.parse::<u64>()
                        .context("Failed to parse MARKETCAST_SEED")?,
                ),
                Err(_) => None,
            },
        };

        if timesteps == 0 {
            anyhow::bail!("MARKETCAST_TIMESTEPS must be at least 1");
        }

        Ok(Self {
            tickers,
            benchmarks,
            timesteps,
            target_feature,
            model,
            ..defaults
        })
    }

    /// Rows required before any window can be built.
    pub fn min_history(&self) -> usize {
        self.timesteps + 1
    }
}

fn parse_list(key: &str, default: &[String]) -> Vec<String> {
    match env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.to_vec(),
    }
}

fn parse_usize(key: &str, default: usize) -> Result<usize> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<usize>()
        .context(format!("Failed to parse {}", key))
}

fn parse_f64(key: &str, default: f64) -> Result<f64> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<f64>()
        .context(format!("Failed to parse {}", key))
}
