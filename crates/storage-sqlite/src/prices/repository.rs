//! SQLite repository for instrument prices.

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use tradelens_core::constants::DATE_FORMAT;
use tradelens_core::prices::{InstrumentPrice, PriceRepositoryTrait};
use tradelens_core::Result;

use super::model::InstrumentPriceDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::instrument_prices;

pub struct PriceRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl PriceRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Upserts end-of-day closes, one transaction per call.
    pub async fn save_prices(&self, to_save: &[InstrumentPrice]) -> Result<usize> {
        if to_save.is_empty() {
            return Ok(0);
        }
        let db_models: Vec<InstrumentPriceDB> = to_save
            .iter()
            .cloned()
            .map(InstrumentPriceDB::from)
            .collect();
        self.writer
            .exec(move |conn| {
                let written = diesel::replace_into(instrument_prices::table)
                    .values(&db_models)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(written)
            })
            .await
    }
}

impl PriceRepositoryTrait for PriceRepository {
    fn get_prices_in_range(
        &self,
        instrument_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<InstrumentPrice>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = instrument_prices::table
            .filter(instrument_prices::instrument_id.eq_any(instrument_ids))
            .filter(instrument_prices::price_date.ge(start.format(DATE_FORMAT).to_string()))
            .filter(instrument_prices::price_date.le(end.format(DATE_FORMAT).to_string()))
            .order(instrument_prices::price_date.asc())
            .select(InstrumentPriceDB::as_select())
            .load::<InstrumentPriceDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(InstrumentPrice::from).collect())
    }

    fn get_price_at(
        &self,
        instrument_id: &str,
        currency: &str,
        date: NaiveDate,
    ) -> Result<Option<InstrumentPrice>> {
        let mut conn = get_connection(&self.pool)?;
        let row = instrument_prices::table
            .filter(instrument_prices::instrument_id.eq(instrument_id))
            .filter(instrument_prices::currency.eq(currency))
            .filter(instrument_prices::price_date.le(date.format(DATE_FORMAT).to_string()))
            .order(instrument_prices::price_date.desc())
            .select(InstrumentPriceDB::as_select())
            .first::<InstrumentPriceDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(InstrumentPrice::from))
    }
}
