use crate::config::PipelineConfig;
use crate::domain::columns::ColumnSet;
use crate::domain::errors::PipelineError;
use crate::domain::feature::FeatureRow;
use crate::domain::snapshot::{RawSnapshot, SnapshotRecord, TickerMetrics};

/// Flattens one heterogeneous snapshot record into a fixed-schema
/// feature row.
///
/// The output always carries the full registry column set: a ticker or
/// benchmark absent from the source record contributes missing markers,
/// never a shorter row. The only way a record fails to parse is having
/// no date at all.
pub struct SnapshotParser {
    tickers: Vec<String>,
    benchmarks: Vec<String>,
    columns: ColumnSet,
}

impl SnapshotParser {
    pub fn new(config: &PipelineConfig) -> Self {
        let columns = ColumnSet::new(
            &config.tickers,
            &config.benchmarks,
            &config.schema_version,
        );
        Self {
            tickers: config.tickers.clone(),
            benchmarks: config.benchmarks.clone(),
            columns,
        }
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// Parses a raw wire-shape snapshot, failing only when the date is
    /// missing. `source_label` identifies the record in the error (file
    /// name, store key, ...).
    pub fn parse_raw(
        &self,
        raw: RawSnapshot,
        source_label: &str,
    ) -> Result<FeatureRow, PipelineError> {
        let record = raw
            .into_record()
            .ok_or_else(|| PipelineError::MalformedSnapshot {
                source_label: source_label.to_string(),
            })?;
        Ok(self.parse(&record))
    }

    /// Projects a well-formed record onto the registry columns.
    pub fn parse(&self, record: &SnapshotRecord) -> FeatureRow {
        let mut values = Vec::with_capacity(self.columns.len());

        for ticker in &self.tickers {
            match record.tickers.get(ticker) {
                Some(metrics) => values.extend(ticker_values(metrics)),
                None => values.extend([None; 7]),
            }
        }
        for benchmark in &self.benchmarks {
            values.push(record.benchmarks.get(benchmark).and_then(|b| b.close()));
        }

        debug_assert_eq!(values.len(), self.columns.len());
        FeatureRow {
            date: record.date,
            values,
        }
    }
}

/// Metric extraction in the exact order of
/// [`crate::domain::columns::TICKER_FIELDS`].
fn ticker_values(m: &TickerMetrics) -> [Option<f64>; 7] {
    [
        m.close,
        m.pct_change,
        m.streak,
        m.confidence,
        m.predicted_next_day_pct,
        m.dip_onset_prob,
        m.dip_exhaustion_prob,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn parser() -> SnapshotParser {
        SnapshotParser::new(&PipelineConfig::default())
    }

    fn record(json: &str) -> SnapshotRecord {
        let raw: RawSnapshot = serde_json::from_str(json).unwrap();
        raw.into_record().unwrap()
    }

    #[test]
    fn test_full_column_set_regardless_of_source_fields() {
        let p = parser();
        let sparse = record(r#"{"date": "2025-04-01"}"#);
        let row = p.parse(&sparse);
        assert_eq!(row.values.len(), p.columns().len());
        assert!(row.values.iter().all(|v| v.is_none()));

        let partial = record(
            r#"{"date": "2025-04-01",
                "tickers": {"OKLO": {"close": 30.5, "streak": 2}},
                "benchmarks": {"VIX": 17.2}}"#,
        );
        let row = p.parse(&partial);
        assert_eq!(row.values.len(), p.columns().len());
        let close_idx = p.columns().index_of("OKLO_close").unwrap();
        let streak_idx = p.columns().index_of("OKLO_streak").unwrap();
        let vix_idx = p.columns().index_of("VIX_close").unwrap();
        let spy_idx = p.columns().index_of("SPY_close").unwrap();
        assert_eq!(row.values[close_idx], Some(30.5));
        assert_eq!(row.values[streak_idx], Some(2.0));
        assert_eq!(row.values[vix_idx], Some(17.2));
        assert_eq!(row.values[spy_idx], None);
    }

    #[test]
    fn test_missing_benchmarks_key_yields_markers() {
        let p = parser();
        let row = p.parse(&record(
            r#"{"date": "2025-04-02", "tickers": {"OKLO": {"close": 31.0}}}"#,
        ));
        for benchmark in ["SPY", "VIXY", "VIXM", "VIX"] {
            let idx = p.columns().index_of(&format!("{benchmark}_close")).unwrap();
            assert_eq!(row.values[idx], None);
        }
    }

    #[test]
    fn test_untracked_ticker_ignored() {
        let p = parser();
        let row = p.parse(&record(
            r#"{"date": "2025-04-03", "tickers": {"TSLA": {"close": 999.0}}}"#,
        ));
        assert!(row.values.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_dateless_record_fails() {
        let p = parser();
        let raw = RawSnapshot {
            date: None,
            tickers: HashMap::new(),
            benchmarks: HashMap::new(),
        };
        let err = p.parse_raw(raw, "broken.json").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedSnapshot { .. }));
    }

    #[test]
    fn test_date_preserved() {
        let p = parser();
        let row = p.parse(&record(r#"{"date": "2025-04-04"}"#));
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2025, 4, 4).unwrap());
    }
}
