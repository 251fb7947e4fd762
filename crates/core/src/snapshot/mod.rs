//! Cumulative per-date snapshots derived from movement history.

mod snapshot_calculator;
mod snapshot_model;
mod snapshot_traits;

pub use snapshot_calculator::*;
pub use snapshot_model::*;
pub use snapshot_traits::*;

#[cfg(test)]
mod snapshot_calculator_tests;
