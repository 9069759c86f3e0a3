pub mod columns;
pub mod errors;
pub mod feature;
pub mod ports;
pub mod prediction;
pub mod snapshot;
