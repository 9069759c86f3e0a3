use crate::application::ml::{Adam, NetConfig, RecurrentNet};
use crate::application::scaler::MinMaxScaler;
use crate::application::windower::build_windows;
use crate::config::PipelineConfig;
use crate::domain::columns::ColumnSet;
use crate::domain::errors::PipelineError;
use crate::domain::feature::DenseTable;
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

/// Minimum window count before a validation slice is held out.
const MIN_WINDOWS_FOR_VALIDATION: usize = 5;
/// Fraction of windows kept for training when validation is in play.
const TRAIN_FRACTION: f64 = 0.8;

/// A trained model and the scaler that encoded its training data, as an
/// inseparable pair. Superseded, never mutated, by the next retrain.
#[derive(Debug, Clone)]
pub struct FittedPredictor {
    pub net: RecurrentNet,
    pub scaler: MinMaxScaler,
    pub target_column: String,
    pub target_index: usize,
}

impl FittedPredictor {
    /// Predicts the target's next value from the `timesteps` most recent
    /// unscaled feature rows, mapped back to the native scale through
    /// the scaler's per-column statistics.
    pub fn predict_next(&self, recent_rows: ArrayView2<f64>) -> Result<f64, PipelineError> {
        let timesteps = self.net.config().timesteps;
        if recent_rows.nrows() != timesteps {
            return Err(PipelineError::InsufficientHistory {
                needed: timesteps,
                got: recent_rows.nrows(),
            });
        }
        let scaled = self.scaler.transform(recent_rows)?;
        let scaled_prediction = self.net.predict(scaled.view());
        Ok(self.scaler.inverse_value(self.target_index, scaled_prediction))
    }
}

/// Outcome of one training invocation.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub windows: usize,
    pub train_windows: usize,
    pub val_windows: usize,
    pub epochs: usize,
    pub train_loss: f64,
    pub val_loss: Option<f64>,
}

/// Fits one regression model per invocation: scales the full table,
/// windows it against the target column, and trains the recurrent
/// network on the result.
pub struct PredictorTrainer {
    config: PipelineConfig,
}

impl PredictorTrainer {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Trains a predictor for `ticker` on the dense table, running
    /// `epochs` passes over the windows.
    pub fn train(
        &self,
        table: &DenseTable,
        ticker: &str,
        epochs: usize,
    ) -> Result<(FittedPredictor, TrainingReport), PipelineError> {
        let mut table = table.clone();
        let target_column = ColumnSet::target_column(ticker, &self.config.target_feature);
        let target_index = match table.columns().index_of(&target_column) {
            Some(idx) => idx,
            None => {
                // Resilience over strictness: a partially populated
                // upstream history defaults the target to zero.
                warn!(column = %target_column, "target column absent, defaulting to zero");
                table.push_zero_column(&target_column);
                table.columns().len() - 1
            }
        };

        let scaler = MinMaxScaler::fit(&table, self.config.scale_range);
        let scaled = scaler.transform(table.values().view())?;
        let windows = build_windows(scaled.view(), target_index, self.config.timesteps)?;

        let split = if windows.len() >= MIN_WINDOWS_FOR_VALIDATION {
            (windows.len() as f64 * TRAIN_FRACTION).floor() as usize
        } else {
            windows.len()
        };
        let (train_x, val_x) = windows.inputs.split_at(split);
        let (train_y, val_y) = windows.labels.split_at(split);

        let mut rng = match self.config.model.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let net_config = NetConfig {
            input_dim: scaled.ncols(),
            timesteps: self.config.timesteps,
            hidden_units: self.config.model.hidden_units,
            dense_units: self.config.model.dense_units,
            dropout: self.config.model.dropout,
        };
        let mut net = RecurrentNet::new(net_config, &mut rng);
        let mut adam = Adam::new(self.config.model.learning_rate);
        let mut moments = net.moments();

        info!(
            ticker,
            windows = windows.len(),
            train = train_x.len(),
            val = val_x.len(),
            epochs,
            "training predictor"
        );

        let mut order: Vec<usize> = (0..train_x.len()).collect();
        let mut train_loss = 0.0;
        for epoch in 0..epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            for &i in &order {
                epoch_loss +=
                    net.train_step(train_x[i].view(), train_y[i], &mut adam, &mut moments, &mut rng);
            }
            train_loss = epoch_loss / train_x.len().max(1) as f64;
            if !val_x.is_empty() {
                let val_loss = mean_loss(&net, val_x, val_y);
                debug!(epoch, train_loss, val_loss, "epoch finished");
            } else {
                debug!(epoch, train_loss, "epoch finished");
            }
        }

        let val_loss = if val_x.is_empty() {
            None
        } else {
            Some(mean_loss(&net, val_x, val_y))
        };

        let report = TrainingReport {
            windows: windows.len(),
            train_windows: train_x.len(),
            val_windows: val_x.len(),
            epochs,
            train_loss,
            val_loss,
        };
        let fitted = FittedPredictor {
            net,
            scaler,
            target_column,
            target_index,
        };
        Ok((fitted, report))
    }
}

fn mean_loss(net: &RecurrentNet, xs: &[ndarray::Array2<f64>], ys: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter()
        .zip(ys)
        .map(|(x, y)| net.loss(x.view(), *y))
        .sum::<f64>()
        / xs.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::domain::feature::DenseTable;
    use chrono::NaiveDate;
    use ndarray::Array2;

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            tickers: vec!["X".to_string()],
            benchmarks: vec!["SPY".to_string()],
            model: ModelConfig {
                hidden_units: 8,
                dense_units: 4,
                epochs: 5,
                backfill_epochs: 3,
                seed: Some(99),
                ..ModelConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    fn dense_table(config: &PipelineConfig, rows: usize) -> DenseTable {
        let columns = ColumnSet::new(&config.tickers, &config.benchmarks, "1.0");
        let n_cols = columns.len();
        let dates = (0..rows)
            .map(|i| NaiveDate::from_ymd_opt(2025, 7, 1).unwrap() + chrono::Days::new(i as u64))
            .collect();
        let values =
            Array2::from_shape_fn((rows, n_cols), |(r, c)| (r as f64) * 0.1 + (c as f64) * 0.01);
        DenseTable::new(columns, dates, values)
    }

    #[test]
    fn test_train_produces_finite_prediction() {
        let config = test_config();
        let table = dense_table(&config, 8);
        let trainer = PredictorTrainer::new(config.clone());
        let (fitted, report) = trainer.train(&table, "X", 3).unwrap();

        assert_eq!(report.windows, 8 - config.timesteps);
        let tail = table
            .values()
            .slice(ndarray::s![8 - config.timesteps.., ..])
            .to_owned();
        let prediction = fitted.predict_next(tail.view()).unwrap();
        assert!(prediction.is_finite());
    }

    #[test]
    fn test_validation_holdout_threshold() {
        let config = test_config();
        let trainer = PredictorTrainer::new(config.clone());

        // 7 rows -> 4 windows: below the threshold, no validation slice.
        let (_, report) = trainer.train(&dense_table(&config, 7), "X", 2).unwrap();
        assert_eq!(report.val_windows, 0);
        assert!(report.val_loss.is_none());

        // 9 rows -> 6 windows: last 20% held out (floor(6*0.8)=4 train).
        let (_, report) = trainer.train(&dense_table(&config, 9), "X", 2).unwrap();
        assert_eq!(report.train_windows, 4);
        assert_eq!(report.val_windows, 2);
        assert!(report.val_loss.is_some());
    }

    #[test]
    fn test_insufficient_history_rejected() {
        let config = test_config();
        let trainer = PredictorTrainer::new(config.clone());
        let err = trainer
            .train(&dense_table(&config, 3), "X", 2)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientHistory { .. }));
    }

    #[test]
    fn test_missing_target_column_defaults_to_zero() {
        let config = test_config();
        let trainer = PredictorTrainer::new(config.clone());
        // "Y" is not a tracked ticker, so its target column is absent.
        let (fitted, _) = trainer.train(&dense_table(&config, 8), "Y", 2).unwrap();
        assert_eq!(fitted.target_column, "Y_predicted_next_day_pct");
        // The appended column is constant zero, so any prediction maps
        // back to zero through the inverted scaler.
        let tail = dense_table(&config, 8);
        let last = tail
            .values()
            .slice(ndarray::s![8 - config.timesteps.., ..])
            .to_owned();
        // Tail width no longer matches the widened training table.
        assert!(fitted.predict_next(last.view()).is_err());
    }

    #[test]
    fn test_wrong_tail_length_rejected() {
        let config = test_config();
        let table = dense_table(&config, 8);
        let trainer = PredictorTrainer::new(config.clone());
        let (fitted, _) = trainer.train(&table, "X", 2).unwrap();
        let short = table.values().slice(ndarray::s![..2, ..]).to_owned();
        assert!(matches!(
            fitted.predict_next(short.view()).unwrap_err(),
            PipelineError::InsufficientHistory { .. }
        ));
    }
}
