pub mod artifacts;
pub mod feature_csv;
pub mod snapshot_store;
