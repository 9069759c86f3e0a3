use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One calendar day's raw market+analysis document.
///
/// Produced once per trading day by the upstream acquisition side and
/// immutable after that. Everything except the date is optional: a
/// snapshot that carries only a date still parses, it just flattens into
/// a row of missing markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Trading date. The only required field; see [`RawSnapshot`] for how
    /// its absence is detected without failing deserialization outright.
    pub date: NaiveDate,
    #[serde(default)]
    pub tickers: HashMap<String, TickerMetrics>,
    #[serde(default)]
    pub benchmarks: HashMap<String, BenchmarkEntry>,
}

/// Wire shape used when reading snapshots whose date may be absent.
///
/// Upstream occasionally emits partial documents; deserializing straight
/// into [`SnapshotRecord`] would turn a missing date into an opaque serde
/// error. This intermediate keeps the distinction so the table builder
/// can skip-and-log that one record.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub tickers: HashMap<String, TickerMetrics>,
    #[serde(default)]
    pub benchmarks: HashMap<String, BenchmarkEntry>,
}

impl RawSnapshot {
    /// Promotes to a [`SnapshotRecord`], returning `None` when the date
    /// is missing.
    pub fn into_record(self) -> Option<SnapshotRecord> {
        Some(SnapshotRecord {
            date: self.date?,
            tickers: self.tickers,
            benchmarks: self.benchmarks,
        })
    }
}

/// Per-ticker metrics inside a snapshot. All optional; the analyst side
/// fills in whatever it managed to compute that day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickerMetrics {
    pub close: Option<f64>,
    pub pct_change: Option<f64>,
    pub streak: Option<f64>,
    pub confidence: Option<f64>,
    pub predicted_next_day_pct: Option<f64>,
    pub dip_onset_prob: Option<f64>,
    pub dip_exhaustion_prob: Option<f64>,
}

/// Benchmark values arrive in two shapes: a bare level (VIX style) or a
/// quote object with at least a close. Anything else maps to the missing
/// marker downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BenchmarkEntry {
    Level(f64),
    Quote(BenchmarkQuote),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkQuote {
    pub close: Option<f64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl BenchmarkEntry {
    /// The close level this entry resolves to, if any.
    pub fn close(&self) -> Option<f64> {
        match self {
            BenchmarkEntry::Level(v) => Some(*v),
            BenchmarkEntry::Quote(q) => q.close,
            BenchmarkEntry::Other(_) => None,
        }
    }
}
