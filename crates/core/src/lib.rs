//! TradeLens Core - Domain entities, calculators, and traits.
//!
//! This crate contains the snapshot calculation engine's business logic.
//! It is database-agnostic and defines repository traits that are
//! implemented by the `storage-sqlite` crate.

pub mod batch;
pub mod constants;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod movements;
pub mod operations;
pub mod prices;
pub mod snapshot;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
