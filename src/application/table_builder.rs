use crate::application::parser::SnapshotParser;
use crate::config::PipelineConfig;
use crate::domain::errors::PipelineError;
use crate::domain::feature::{FeatureRow, FeatureTable};
use crate::domain::ports::SnapshotStore;
use chrono::NaiveDate;
use tracing::{info, warn};

/// Assembles the date-ordered feature table from stored snapshots.
///
/// Individual records that cannot be read or parsed are skipped with a
/// warning; only a history with zero usable rows fails the build.
pub struct FeatureTableBuilder {
    parser: SnapshotParser,
}

impl FeatureTableBuilder {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            parser: SnapshotParser::new(config),
        }
    }

    pub fn parser(&self) -> &SnapshotParser {
        &self.parser
    }

    /// Builds the table over every snapshot the store has.
    pub fn build(&self, store: &dyn SnapshotStore) -> Result<FeatureTable, PipelineError> {
        let dates = store.list_dates()?;
        self.build_for_dates(store, &dates)
    }

    /// Builds the table over an explicit date subset; the progressive
    /// predictor uses this with strict history prefixes.
    pub fn build_for_dates(
        &self,
        store: &dyn SnapshotStore,
        dates: &[NaiveDate],
    ) -> Result<FeatureTable, PipelineError> {
        let mut rows: Vec<FeatureRow> = Vec::with_capacity(dates.len());
        for &date in dates {
            match self.load_row(store, date) {
                Ok(row) => rows.push(row),
                Err(err) => warn!(%date, %err, "skipping unusable snapshot"),
            }
        }
        if rows.is_empty() {
            return Err(PipelineError::EmptyHistory);
        }
        info!(rows = rows.len(), requested = dates.len(), "feature table assembled");
        FeatureTable::from_rows(self.parser.columns().clone(), rows)
    }

    fn load_row(
        &self,
        store: &dyn SnapshotStore,
        date: NaiveDate,
    ) -> Result<FeatureRow, PipelineError> {
        let raw = store.read(date)?;
        self.parser.parse_raw(raw, &date.to_string())
    }
}
