//! Movement model - immutable trade/dividend/cash-transfer records.

mod movements_model;
mod movements_traits;

pub use movements_model::*;
pub use movements_traits::*;

#[cfg(test)]
mod movements_model_tests;
