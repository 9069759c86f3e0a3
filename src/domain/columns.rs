use serde::{Deserialize, Serialize};

/// Per-ticker field names, in the order they appear in every feature row.
/// This order is persisted alongside the scaler and baked into trained
/// models. Any change here is a breaking change for existing artifacts.
pub const TICKER_FIELDS: &[&str] = &[
    "close",
    "pct_change",
    "streak",
    "confidence",
    "predicted_next_day_pct",
    "dip_onset_prob",
    "dip_exhaustion_prob",
];

/// Versioned, explicitly ordered feature-column registry.
///
/// Built once from configuration (tracked tickers, then tracked
/// benchmarks) and threaded through the table builder, scaler and model
/// so the column order used at training time can never silently drift
/// from the one used at inference time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSet {
    names: Vec<String>,
    pub schema_version: String,
}

impl ColumnSet {
    pub fn new(tickers: &[String], benchmarks: &[String], schema_version: &str) -> Self {
        let mut names =
            Vec::with_capacity(tickers.len() * TICKER_FIELDS.len() + benchmarks.len());
        for ticker in tickers {
            for field in TICKER_FIELDS {
                names.push(format!("{ticker}_{field}"));
            }
        }
        for benchmark in benchmarks {
            names.push(format!("{benchmark}_close"));
        }
        Self {
            names,
            schema_version: schema_version.to_string(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of a column by name, e.g. `OKLO_predicted_next_day_pct`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Appends a column; only the defaulting path for absent target
    /// columns should ever need this.
    pub fn push(&mut self, name: &str) {
        self.names.push(name.to_string());
    }

    /// Column name for a ticker's target feature.
    pub fn target_column(ticker: &str, target_feature: &str) -> String {
        format!("{ticker}_{target_feature}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ColumnSet {
        ColumnSet::new(
            &["OKLO".to_string(), "RKLB".to_string()],
            &["SPY".to_string(), "VIX".to_string()],
            "1.0",
        )
    }

    #[test]
    fn test_column_count_and_order() {
        let cols = sample();
        assert_eq!(cols.len(), 2 * TICKER_FIELDS.len() + 2);
        assert_eq!(cols.names()[0], "OKLO_close");
        assert_eq!(cols.names()[TICKER_FIELDS.len()], "RKLB_close");
        assert_eq!(cols.names()[cols.len() - 1], "VIX_close");
    }

    #[test]
    fn test_index_lookup() {
        let cols = sample();
        let target = ColumnSet::target_column("OKLO", "predicted_next_day_pct");
        assert_eq!(cols.index_of(&target), Some(4));
        assert_eq!(cols.index_of("MISSING_close"), None);
    }
}
