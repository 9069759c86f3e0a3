//! marketcast: a walk-forward feature and prediction pipeline for daily
//! market snapshots.
//!
//! Daily snapshot documents (price quotes plus analyst-generated fields)
//! are flattened into a chronologically ordered feature table, cut into
//! fixed-length sequences, and fed to a small recurrent regression model
//! that is retrained on a growing history prefix to predict each next
//! day in turn.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
