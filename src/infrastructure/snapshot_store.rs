//! Snapshot store implementations.
//!
//! The pipeline only ever talks to the [`SnapshotStore`] trait; the
//! filesystem layout (one JSON document per trading day) lives entirely
//! in here.

use crate::domain::errors::PipelineError;
use crate::domain::ports::SnapshotStore;
use crate::domain::snapshot::{RawSnapshot, SnapshotRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Directory of `YYYY-MM-DD.json` documents, one per trading day.
pub struct FsSnapshotStore {
    dir: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format(DATE_FORMAT)))
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn list_dates(&self) -> Result<Vec<NaiveDate>, PipelineError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| PipelineError::Store {
            date: self.dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::Store {
                date: self.dir.display().to_string(),
                reason: e.to_string(),
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            match NaiveDate::parse_from_str(stem, DATE_FORMAT) {
                Ok(date) => dates.push(date),
                Err(_) => {
                    debug!(file = %name, "ignoring non-snapshot file");
                }
            }
        }
        dates.sort_unstable();
        Ok(dates)
    }

    fn read(&self, date: NaiveDate) -> Result<RawSnapshot, PipelineError> {
        let path = self.path_for(date);
        let content = fs::read_to_string(&path).map_err(|e| PipelineError::Store {
            date: date.to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| PipelineError::Store {
            date: date.to_string(),
            reason: e.to_string(),
        })
    }

    fn write(&self, date: NaiveDate, record: &SnapshotRecord) -> Result<(), PipelineError> {
        let to_store = |e: std::io::Error| PipelineError::Store {
            date: date.to_string(),
            reason: e.to_string(),
        };
        fs::create_dir_all(&self.dir).map_err(to_store)?;
        let content = serde_json::to_string_pretty(record).map_err(|e| PipelineError::Store {
            date: date.to_string(),
            reason: e.to_string(),
        })?;

        // Write-then-rename so a crash never leaves a half-written day.
        let path = self.path_for(date);
        let temp = path.with_extension("tmp");
        fs::write(&temp, content).map_err(to_store)?;
        fs::rename(&temp, &path).map_err(to_store)?;
        Ok(())
    }
}

/// Test-oriented store keeping raw snapshots in a map.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    records: Mutex<BTreeMap<NaiveDate, RawSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a raw document as-is, malformed shapes included.
    pub fn insert_raw(&self, date: NaiveDate, raw: RawSnapshot) {
        if let Ok(mut records) = self.records.lock() {
            if records.insert(date, raw).is_some() {
                warn!(%date, "replacing existing in-memory snapshot");
            }
        }
    }

    fn locked(
        &self,
        date: &str,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<NaiveDate, RawSnapshot>>, PipelineError> {
        self.records.lock().map_err(|_| PipelineError::Store {
            date: date.to_string(),
            reason: "in-memory store lock poisoned".to_string(),
        })
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn list_dates(&self) -> Result<Vec<NaiveDate>, PipelineError> {
        Ok(self.locked("*")?.keys().copied().collect())
    }

    fn read(&self, date: NaiveDate) -> Result<RawSnapshot, PipelineError> {
        self.locked(&date.to_string())?
            .get(&date)
            .cloned()
            .ok_or_else(|| PipelineError::Store {
                date: date.to_string(),
                reason: "no snapshot for date".to_string(),
            })
    }

    fn write(&self, date: NaiveDate, record: &SnapshotRecord) -> Result<(), PipelineError> {
        let raw = RawSnapshot {
            date: Some(record.date),
            tickers: record.tickers.clone(),
            benchmarks: record.benchmarks.clone(),
        };
        self.locked(&date.to_string())?.insert(date, raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, day).unwrap()
    }

    fn record(day: u32) -> SnapshotRecord {
        SnapshotRecord {
            date: date(day),
            tickers: HashMap::new(),
            benchmarks: HashMap::new(),
        }
    }

    #[test]
    fn test_fs_store_round_trip_and_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(tmp.path());

        store.write(date(3), &record(3)).unwrap();
        store.write(date(1), &record(1)).unwrap();
        store.write(date(2), &record(2)).unwrap();
        // Non-snapshot files are ignored.
        std::fs::write(tmp.path().join("README.txt"), "notes").unwrap();
        std::fs::write(tmp.path().join("bad-name.json"), "{}").unwrap();

        assert_eq!(store.list_dates().unwrap(), vec![date(1), date(2), date(3)]);
        let raw = store.read(date(2)).unwrap();
        assert_eq!(raw.date, Some(date(2)));
    }

    #[test]
    fn test_fs_store_missing_file_is_store_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(tmp.path());
        assert!(matches!(
            store.read(date(9)).unwrap_err(),
            PipelineError::Store { .. }
        ));
    }

    #[test]
    fn test_fs_store_empty_dir_lists_nothing() {
        let store = FsSnapshotStore::new("/nonexistent/marketcast-snapshots");
        assert!(store.list_dates().unwrap().is_empty());
    }

    #[test]
    fn test_in_memory_round_trip() {
        let store = InMemorySnapshotStore::new();
        store.write(date(5), &record(5)).unwrap();
        assert_eq!(store.list_dates().unwrap(), vec![date(5)]);
        assert_eq!(store.read(date(5)).unwrap().date, Some(date(5)));
        assert!(store.read(date(6)).is_err());
    }
}
