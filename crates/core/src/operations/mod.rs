//! Operation matching - FIFO pairing of opening/closing trades into
//! logical trading cycles.

mod operation_matcher;
mod operations_model;
mod operations_traits;

pub use operation_matcher::*;
pub use operations_model::*;
pub use operations_traits::*;

#[cfg(test)]
mod operation_matcher_tests;
