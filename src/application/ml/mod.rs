//! A small trainable recurrent regression network.
//!
//! The corpus of crates this project leans on has no trainable recurrent
//! model, so the layers are implemented directly over `ndarray`: GRU
//! cells with full backpropagation-through-time, inverted dropout, a
//! linear dense head, and Adam updates. Everything is `f64` and runs on
//! a single thread; the sequences involved are a handful of timesteps
//! over a few dozen columns.

pub mod adam;
pub mod dense;
pub mod gru;
pub mod net;

pub use adam::Adam;
pub use net::{NetConfig, RecurrentNet};
