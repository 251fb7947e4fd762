//! Bulk batch mode: prefetch, chronological replay, single-shot persistence.

mod batch_calculator;
mod batch_loader;
mod batch_model;

pub use batch_calculator::*;
pub use batch_loader::*;
pub use batch_model::*;
