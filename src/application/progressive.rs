//! Walk-forward prediction over an expanding history prefix.
//!
//! For every historical date past the first `timesteps`, a brand-new
//! model is trained on the records strictly before that date and asked
//! to predict it, producing a back-tested prediction series with full
//! provenance. Each iteration reads an immutable prefix and writes its
//! own record, so the walk fans out across dates with rayon.

use crate::application::ml::{NetConfig, RecurrentNet};
use crate::application::scaler::MinMaxScaler;
use crate::application::table_builder::FeatureTableBuilder;
use crate::application::trainer::{FittedPredictor, PredictorTrainer};
use crate::config::PipelineConfig;
use crate::domain::columns::ColumnSet;
use crate::domain::errors::PipelineError;
use crate::domain::feature::DenseTable;
use crate::domain::ports::SnapshotStore;
use crate::domain::prediction::{PredictionMetadata, PredictionRecord, TickerPrediction};
use chrono::{NaiveDate, Utc};
use ndarray::s;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub struct ProgressivePredictor {
    config: PipelineConfig,
    trainer: PredictorTrainer,
}

impl ProgressivePredictor {
    pub fn new(config: PipelineConfig) -> Self {
        let trainer = PredictorTrainer::new(config.clone());
        Self { config, trainer }
    }

    /// Runs the full walk: one prediction record per stored date from
    /// the `timesteps`-th onward (0-based), each trained on the dates
    /// strictly before it. Per-date failures are logged and skipped;
    /// the run itself only fails when the store yields no dates at all.
    pub fn run(&self, store: &dyn SnapshotStore) -> Result<Vec<PredictionRecord>, PipelineError> {
        let mut dates = store.list_dates()?;
        if dates.is_empty() {
            return Err(PipelineError::EmptyHistory);
        }
        dates.sort_unstable();

        let timesteps = self.config.timesteps;
        info!(
            total = dates.len(),
            skipped = timesteps.min(dates.len()),
            "starting walk-forward run"
        );

        let mut records: Vec<PredictionRecord> = (timesteps..dates.len())
            .into_par_iter()
            .filter_map(|i| {
                let target = dates[i];
                match self.predict_date(store, &dates[..i], target) {
                    Ok(Some(record)) => Some(record),
                    Ok(None) => {
                        warn!(date = %target, "no ticker produced a prediction, skipping date");
                        None
                    }
                    Err(err) => {
                        warn!(date = %target, error = %err, "skipping date");
                        None
                    }
                }
            })
            .collect();
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    /// Trains on the prefix and predicts one target date. `None` means
    /// every ticker failed individually; an `Err` means the prefix
    /// itself was unusable.
    fn predict_date(
        &self,
        store: &dyn SnapshotStore,
        prefix: &[NaiveDate],
        target: NaiveDate,
    ) -> Result<Option<PredictionRecord>, PipelineError> {
        let builder = FeatureTableBuilder::new(&self.config);
        let table = builder.build_for_dates(store, prefix)?;
        let dense = table.resolve_missing();

        let mut predictions = BTreeMap::new();
        for ticker in &self.config.tickers {
            match self.ticker_prediction(&dense, ticker) {
                Ok(value) => {
                    predictions.insert(
                        ticker.clone(),
                        TickerPrediction {
                            predicted_next_day_pct: value,
                        },
                    );
                }
                Err(err) => {
                    warn!(date = %target, ticker, error = %err, "skipping ticker");
                }
            }
        }
        if predictions.is_empty() {
            return Ok(None);
        }

        let metadata = match PredictionMetadata::from_sources(
            dense.dates().to_vec(),
            dense.columns().len(),
            &self.config.model_version,
            self.config.timesteps,
        ) {
            Some(metadata) => metadata,
            None => return Ok(None),
        };
        Ok(Some(PredictionRecord {
            date: target,
            created_at: Utc::now(),
            predictions,
            metadata,
            schema_version: self.config.schema_version.clone(),
        }))
    }

    fn ticker_prediction(
        &self,
        dense: &DenseTable,
        ticker: &str,
    ) -> Result<f64, PipelineError> {
        let timesteps = self.config.timesteps;
        if dense.len() < timesteps {
            return Err(PipelineError::InsufficientHistory {
                needed: timesteps,
                got: dense.len(),
            });
        }
        let fitted = if dense.len() == timesteps {
            // The very first walk iteration sees exactly one window's
            // worth of history: nothing to label, so the network stays
            // at its initialization and only the scaler is fitted.
            warn!(ticker, rows = dense.len(), "minimal history, predicting from untrained model");
            self.minimal_predictor(dense, ticker)?
        } else {
            let (fitted, _report) =
                self.trainer
                    .train(dense, ticker, self.config.model.backfill_epochs)?;
            fitted
        };
        let tail = dense
            .values()
            .slice(s![dense.len() - timesteps.., ..]);
        fitted.predict_next(tail)
    }

    fn minimal_predictor(
        &self,
        dense: &DenseTable,
        ticker: &str,
    ) -> Result<FittedPredictor, PipelineError> {
        let target_column = ColumnSet::target_column(ticker, &self.config.target_feature);
        let target_index = dense
            .columns()
            .index_of(&target_column)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: target_column.clone(),
            })?;
        let scaler = MinMaxScaler::fit(dense, self.config.scale_range);
        let mut rng = match self.config.model.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let net = RecurrentNet::new(
            NetConfig {
                input_dim: dense.columns().len(),
                timesteps: self.config.timesteps,
                hidden_units: self.config.model.hidden_units,
                dense_units: self.config.model.dense_units,
                dropout: self.config.model.dropout,
            },
            &mut rng,
        );
        Ok(FittedPredictor {
            net,
            scaler,
            target_column,
            target_index,
        })
    }
}
