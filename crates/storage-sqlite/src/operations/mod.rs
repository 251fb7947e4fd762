//! SQLite storage implementation for operations.

mod model;
mod repository;

pub use model::OperationDB;
pub use repository::OperationRepository;
