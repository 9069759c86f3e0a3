use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: &str = "1.0";

/// One persisted prediction: the target date, per-ticker predicted
/// values, and the provenance of exactly which history produced them.
/// Append-only, one record per target date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub predictions: BTreeMap<String, TickerPrediction>,
    pub metadata: PredictionMetadata,
    pub schema_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerPrediction {
    pub predicted_next_day_pct: f64,
}

/// Training provenance: which source dates contributed, the span they
/// cover, and the shape of the table the model saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionMetadata {
    pub training_data_sources: Vec<NaiveDate>,
    pub training_period: TrainingPeriod,
    pub feature_count: usize,
    pub training_samples: usize,
    pub model_version: String,
    pub timesteps: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl PredictionMetadata {
    /// Builds provenance from the training dates. Returns `None` for an
    /// empty source list; a prediction without provenance is meaningless.
    pub fn from_sources(
        mut sources: Vec<NaiveDate>,
        feature_count: usize,
        model_version: &str,
        timesteps: usize,
    ) -> Option<Self> {
        sources.sort_unstable();
        let start_date = *sources.first()?;
        let end_date = *sources.last()?;
        let training_samples = sources.len();
        Some(Self {
            training_data_sources: sources,
            training_period: TrainingPeriod {
                start_date,
                end_date,
            },
            feature_count,
            training_samples,
            model_version: model_version.to_string(),
            timesteps,
        })
    }
}
