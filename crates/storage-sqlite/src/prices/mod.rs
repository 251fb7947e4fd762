//! SQLite storage implementation for instrument prices.

mod model;
mod repository;

pub use model::InstrumentPriceDB;
pub use repository::PriceRepository;
