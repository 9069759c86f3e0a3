//! Persistence for trained artifacts and prediction records.
//!
//! One serialized model per (ticker, model version), one shared scaler
//! carrying the column ordering, and one prediction document per target
//! date. Everything is JSON so artifacts stay inspectable.

use crate::application::ml::RecurrentNet;
use crate::application::scaler::MinMaxScaler;
use crate::application::trainer::FittedPredictor;
use crate::config::PipelineConfig;
use crate::domain::columns::ColumnSet;
use crate::domain::errors::PipelineError;
use crate::domain::prediction::PredictionRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self, ticker: &str, model_version: &str) -> PathBuf {
        self.dir
            .join(format!("rnn_model_{ticker}_{model_version}.json"))
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join("scaler.json")
    }

    pub fn prediction_path(&self, record: &PredictionRecord) -> PathBuf {
        self.dir.join(format!("{}.json", record.date))
    }

    pub fn save_model(
        &self,
        ticker: &str,
        model_version: &str,
        net: &RecurrentNet,
    ) -> Result<(), PipelineError> {
        let path = self.model_path(ticker, model_version);
        self.write_json(&path, net)?;
        info!(ticker, path = %path.display(), "model saved");
        Ok(())
    }

    pub fn load_model(
        &self,
        ticker: &str,
        model_version: &str,
    ) -> Result<RecurrentNet, PipelineError> {
        self.read_json(&self.model_path(ticker, model_version))
    }

    pub fn save_scaler(&self, scaler: &MinMaxScaler) -> Result<(), PipelineError> {
        self.write_json(&self.scaler_path(), scaler)
    }

    pub fn load_scaler(&self) -> Result<MinMaxScaler, PipelineError> {
        self.read_json(&self.scaler_path())
    }

    /// Reassembles the model/scaler pair for one ticker. Either file
    /// missing or unreadable fails this ticker only; callers predicting
    /// several tickers keep going with the rest.
    pub fn load_predictor(
        &self,
        config: &PipelineConfig,
        ticker: &str,
    ) -> Result<FittedPredictor, PipelineError> {
        let net = self.load_model(ticker, &config.model_version)?;
        let scaler = self.load_scaler()?;
        let target_column = ColumnSet::target_column(ticker, &config.target_feature);
        let target_index = scaler.columns().index_of(&target_column).ok_or_else(|| {
            PipelineError::MissingColumn {
                column: target_column.clone(),
            }
        })?;
        Ok(FittedPredictor {
            net,
            scaler,
            target_column,
            target_index,
        })
    }

    /// Writes one prediction document under its target date. Append-only
    /// by convention; rewriting a date replaces that day's record.
    pub fn save_prediction(&self, record: &PredictionRecord) -> Result<PathBuf, PipelineError> {
        let path = self.prediction_path(record);
        self.write_json(&path, record)?;
        info!(date = %record.date, path = %path.display(), "prediction saved");
        Ok(path)
    }

    pub fn load_prediction(&self, path: &Path) -> Result<PredictionRecord, PipelineError> {
        self.read_json(path)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), PipelineError> {
        let to_artifact = |reason: String| PipelineError::Artifact {
            path: path.display().to_string(),
            reason,
        };
        fs::create_dir_all(&self.dir).map_err(|e| to_artifact(e.to_string()))?;
        let content =
            serde_json::to_string_pretty(value).map_err(|e| to_artifact(e.to_string()))?;
        let temp = path.with_extension("tmp");
        fs::write(&temp, content).map_err(|e| to_artifact(e.to_string()))?;
        fs::rename(&temp, path).map_err(|e| to_artifact(e.to_string()))?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, PipelineError> {
        let to_artifact = |reason: String| PipelineError::Artifact {
            path: path.display().to_string(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| to_artifact(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| to_artifact(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::NetConfig;
    use crate::domain::feature::DenseTable;
    use chrono::NaiveDate;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_net() -> RecurrentNet {
        let mut rng = StdRng::seed_from_u64(11);
        RecurrentNet::new(
            NetConfig {
                input_dim: 2,
                timesteps: 3,
                hidden_units: 4,
                dense_units: 2,
                dropout: 0.2,
            },
            &mut rng,
        )
    }

    fn sample_scaler() -> MinMaxScaler {
        let mut columns = ColumnSet::new(&[], &[], "1.0");
        columns.push("X_predicted_next_day_pct");
        columns.push("SPY_close");
        let table = DenseTable::new(
            columns,
            vec![
                NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 8, 2).unwrap(),
            ],
            array![[0.1, 440.0], [-0.2, 450.0]],
        );
        MinMaxScaler::fit(&table, (0.0, 1.0))
    }

    #[test]
    fn test_model_and_scaler_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let net = sample_net();
        store.save_model("X", "v1", &net).unwrap();
        store.save_scaler(&sample_scaler()).unwrap();

        let config = PipelineConfig {
            tickers: vec!["X".to_string()],
            ..PipelineConfig::default()
        };
        let fitted = store.load_predictor(&config, "X").unwrap();
        assert_eq!(fitted.target_column, "X_predicted_next_day_pct");
        assert_eq!(fitted.target_index, 0);

        let window = array![[0.2, 0.4], [0.6, 0.1], [0.3, 0.9]];
        assert_eq!(fitted.net.predict(window.view()), net.predict(window.view()));
    }

    #[test]
    fn test_missing_model_is_artifact_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        store.save_scaler(&sample_scaler()).unwrap();
        assert!(matches!(
            store.load_predictor(&PipelineConfig::default(), "OKLO"),
            Err(PipelineError::Artifact { .. })
        ));
    }

    #[test]
    fn test_untracked_target_column_is_missing_column() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        store.save_model("ZZZ", "v1", &sample_net()).unwrap();
        store.save_scaler(&sample_scaler()).unwrap();
        assert!(matches!(
            store.load_predictor(&PipelineConfig::default(), "ZZZ"),
            Err(PipelineError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_prediction_record_round_trip() {
        use crate::domain::prediction::{PredictionMetadata, TickerPrediction};
        use std::collections::BTreeMap;

        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());

        let date = NaiveDate::from_ymd_opt(2025, 8, 4).unwrap();
        let metadata = PredictionMetadata::from_sources(
            vec![
                NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 8, 2).unwrap(),
                NaiveDate::from_ymd_opt(2025, 8, 3).unwrap(),
            ],
            16,
            "v1",
            3,
        )
        .unwrap();
        let mut predictions = BTreeMap::new();
        predictions.insert(
            "X".to_string(),
            TickerPrediction {
                predicted_next_day_pct: -0.73,
            },
        );
        let record = PredictionRecord {
            date,
            created_at: chrono::Utc::now(),
            predictions,
            metadata,
            schema_version: "1.0".to_string(),
        };

        let path = store.save_prediction(&record).unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "2025-08-04.json");
        let loaded = store.load_prediction(&path).unwrap();
        assert_eq!(loaded.date, date);
        assert_eq!(loaded.predictions["X"].predicted_next_day_pct, -0.73);
        assert_eq!(loaded.metadata.training_samples, 3);
    }
}
