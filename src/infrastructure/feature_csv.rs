//! Flat CSV form of the feature table: a `date` index column followed by
//! one column per registry entry. The write side emits the dense table;
//! the read side tolerates empty cells so a hand-edited or partially
//! populated file still loads as a sparse table.

use crate::domain::columns::ColumnSet;
use crate::domain::errors::PipelineError;
use crate::domain::feature::{DenseTable, FeatureRow, FeatureTable};
use chrono::NaiveDate;
use std::path::Path;
use tracing::info;

const DATE_COLUMN: &str = "date";

fn artifact_err(path: &Path, reason: impl ToString) -> PipelineError {
    PipelineError::Artifact {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Writes a resolved table as CSV, one row per date.
pub fn write_dense(path: &Path, table: &DenseTable) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| artifact_err(path, e))?;

    let mut header = Vec::with_capacity(table.columns().len() + 1);
    header.push(DATE_COLUMN.to_string());
    header.extend(table.columns().names().iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| artifact_err(path, e))?;

    for (i, date) in table.dates().iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(date.to_string());
        for value in table.values().row(i) {
            record.push(value.to_string());
        }
        writer
            .write_record(&record)
            .map_err(|e| artifact_err(path, e))?;
    }
    writer.flush().map_err(|e| artifact_err(path, e))?;
    info!(path = %path.display(), rows = table.len(), "feature table written");
    Ok(())
}

/// Reads a feature table back. Empty cells become missing markers, so
/// the result may need [`FeatureTable::resolve_missing`] before use.
pub fn read_table(path: &Path, schema_version: &str) -> Result<FeatureTable, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| artifact_err(path, e))?;

    let headers = reader.headers().map_err(|e| artifact_err(path, e))?.clone();
    let mut fields = headers.iter();
    if fields.next() != Some(DATE_COLUMN) {
        return Err(artifact_err(path, "first column must be `date`"));
    }
    let mut columns = ColumnSet::new(&[], &[], schema_version);
    for name in fields {
        columns.push(name);
    }
    if columns.is_empty() {
        return Err(artifact_err(path, "no feature columns in header"));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| artifact_err(path, e))?;
        let mut cells = record.iter();
        let date_field = cells
            .next()
            .ok_or_else(|| artifact_err(path, "row without a date cell"))?;
        let date = NaiveDate::parse_from_str(date_field, "%Y-%m-%d")
            .map_err(|e| artifact_err(path, format!("bad date `{date_field}`: {e}")))?;

        let mut values = Vec::with_capacity(columns.len());
        for cell in cells {
            if cell.is_empty() {
                values.push(None);
            } else {
                let parsed = cell
                    .parse::<f64>()
                    .map_err(|e| artifact_err(path, format!("bad number `{cell}`: {e}")))?;
                values.push(Some(parsed));
            }
        }
        if values.len() != columns.len() {
            return Err(artifact_err(
                path,
                format!(
                    "row for {date} has {} cells, header has {}",
                    values.len(),
                    columns.len()
                ),
            ));
        }
        rows.push(FeatureRow { date, values });
    }
    FeatureTable::from_rows(columns, rows)
}
