//! Instrument price models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// End-of-day closing price of one instrument in one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentPrice {
    pub instrument_id: String,
    pub currency: String,
    pub date: NaiveDate,
    pub close: Decimal,
}
