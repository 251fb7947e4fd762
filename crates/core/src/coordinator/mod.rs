//! Processing coordination: batch and per-date paths, concurrency flag.

mod processing_coordinator;

pub use processing_coordinator::*;
