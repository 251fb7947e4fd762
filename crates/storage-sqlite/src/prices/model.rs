//! Database model for instrument prices.

use chrono::NaiveDate;
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use tradelens_core::constants::{DATE_FORMAT, DECIMAL_PRECISION};
use tradelens_core::prices::InstrumentPrice;

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::instrument_prices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct InstrumentPriceDB {
    pub instrument_id: String,
    pub currency: String,
    pub price_date: String,
    pub close: String,
}

impl From<InstrumentPriceDB> for InstrumentPrice {
    fn from(db: InstrumentPriceDB) -> Self {
        InstrumentPrice {
            instrument_id: db.instrument_id,
            currency: db.currency,
            date: NaiveDate::parse_from_str(&db.price_date, DATE_FORMAT).unwrap_or_default(),
            close: Decimal::from_str(&db.close).unwrap_or_default(),
        }
    }
}

impl From<InstrumentPrice> for InstrumentPriceDB {
    fn from(domain: InstrumentPrice) -> Self {
        InstrumentPriceDB {
            instrument_id: domain.instrument_id,
            currency: domain.currency,
            price_date: domain.date.format(DATE_FORMAT).to_string(),
            close: domain.close.round_dp(DECIMAL_PRECISION).to_string(),
        }
    }
}
