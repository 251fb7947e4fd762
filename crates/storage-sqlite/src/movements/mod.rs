//! SQLite storage implementation for movements.

mod model;
mod repository;

pub use model::MovementDB;
pub use repository::MovementRepository;
