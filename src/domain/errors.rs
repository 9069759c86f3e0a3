use thiserror::Error;

/// Errors raised along the feature-and-prediction pipeline.
///
/// Granularity matters here: a malformed record or a missing column is
/// recovered locally (skip or default) by the stage that hits it, while
/// whole-invocation failures (no data at all, too little history, an
/// unreadable artifact) propagate to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed snapshot {source_label}: record has no date field")]
    MalformedSnapshot { source_label: String },

    #[error("no usable history rows could be assembled")]
    EmptyHistory,

    #[error("insufficient history: need at least {needed} rows, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("column not found in feature table: {column}")]
    MissingColumn { column: String },

    #[error("column count mismatch: scaler fitted on {expected} columns, input has {got}")]
    ColumnMismatch { expected: usize, got: usize },

    #[error("artifact unusable at {path}: {reason}")]
    Artifact { path: String, reason: String },

    #[error("snapshot store failure for {date}: {reason}")]
    Store { date: String, reason: String },
}
