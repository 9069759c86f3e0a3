//! Storage abstraction the pipeline core depends on.
//!
//! The core never assumes a particular on-disk layout for snapshots; it
//! only speaks this interface. The filesystem one-document-per-date
//! implementation lives in the infrastructure layer, and an in-memory
//! implementation backs the tests.

use crate::domain::errors::PipelineError;
use crate::domain::snapshot::{RawSnapshot, SnapshotRecord};
use chrono::NaiveDate;

/// A readable, appendable collection of dated snapshot documents.
pub trait SnapshotStore: Send + Sync {
    /// Every date with a stored snapshot, ascending.
    fn list_dates(&self) -> Result<Vec<NaiveDate>, PipelineError>;

    /// Reads one snapshot in its raw wire shape. The record's own date
    /// field may be absent or disagree with the key; the parser decides
    /// what that means.
    fn read(&self, date: NaiveDate) -> Result<RawSnapshot, PipelineError>;

    /// Persists one snapshot under its date. Create-once semantics:
    /// overwriting an existing date is allowed but unexpected.
    fn write(&self, date: NaiveDate, record: &SnapshotRecord) -> Result<(), PipelineError>;
}
