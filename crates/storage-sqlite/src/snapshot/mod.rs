//! SQLite storage implementation for snapshots.

mod model;
mod repository;

pub use model::{AccountSnapshotDB, CurrencySnapshotDB, NewInstrumentSnapshotRow};
pub use repository::SnapshotRepository;
