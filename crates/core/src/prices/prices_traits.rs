//! Repository trait for instrument prices.

use chrono::NaiveDate;

use super::InstrumentPrice;
use crate::errors::Result;

/// Prices are reference data maintained outside the engine; the engine
/// only reads them to mark open share positions to market. A missing
/// price is not an error here: callers skip the mark-to-market fields
/// for that cell.
pub trait PriceRepositoryTrait: Send + Sync {
    /// All prices for the given instruments in `[start, end]`.
    fn get_prices_in_range(
        &self,
        instrument_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<InstrumentPrice>>;

    /// Latest price on or before `date`, if any.
    fn get_price_at(
        &self,
        instrument_id: &str,
        currency: &str,
        date: NaiveDate,
    ) -> Result<Option<InstrumentPrice>>;
}
