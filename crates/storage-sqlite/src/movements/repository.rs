//! SQLite repository for movements.

use chrono::{Days, NaiveDate};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use tradelens_core::constants::DATE_FORMAT;
use tradelens_core::movements::{Movement, MovementRepositoryTrait};
use tradelens_core::Result;

use super::model::MovementDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::movements;

/// Timestamps are stored as ISO-8601 text, so date bounds become string
/// prefix bounds: `[dateT00:00:00, nextDateT00:00:00)`.
fn day_lower_bound(date: NaiveDate) -> String {
    format!("{}T00:00:00", date.format(DATE_FORMAT))
}

fn day_upper_bound(date: NaiveDate) -> String {
    let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
    format!("{}T00:00:00", next.format(DATE_FORMAT))
}

pub struct MovementRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl MovementRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Persists imported movements. One call is one transaction; re-imported
    /// ids replace the stored row.
    pub async fn save_movements(&self, to_save: &[Movement]) -> Result<usize> {
        if to_save.is_empty() {
            return Ok(0);
        }
        let db_models: Vec<MovementDB> = to_save.iter().cloned().map(MovementDB::from).collect();
        self.writer
            .exec(move |conn| {
                let written = diesel::replace_into(movements::table)
                    .values(&db_models)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(written)
            })
            .await
    }

    /// Deletes movements by id, for undoing a bad import.
    pub async fn delete_movements(&self, ids: &[String]) -> Result<usize> {
        let owned = ids.to_vec();
        self.writer
            .exec(move |conn| {
                let deleted = diesel::delete(movements::table.filter(movements::id.eq_any(owned)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(deleted)
            })
            .await
    }
}

impl MovementRepositoryTrait for MovementRepository {
    fn get_in_range(
        &self,
        account_id: &str,
        instrument_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Movement>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = movements::table
            .filter(movements::account_id.eq(account_id))
            .filter(movements::event_timestamp.ge(day_lower_bound(start)))
            .filter(movements::event_timestamp.lt(day_upper_bound(end)))
            .filter(
                movements::instrument_id
                    .is_null()
                    .or(movements::instrument_id.eq_any(instrument_ids)),
            )
            .order(movements::event_timestamp.asc())
            .select(MovementDB::as_select())
            .load::<MovementDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(Movement::from).collect())
    }

    fn get_for_instrument(&self, account_id: &str, instrument_id: &str) -> Result<Vec<Movement>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = movements::table
            .filter(movements::account_id.eq(account_id))
            .filter(movements::instrument_id.eq(instrument_id))
            .order(movements::event_timestamp.asc())
            .select(MovementDB::as_select())
            .load::<MovementDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(Movement::from).collect())
    }

    fn get_earliest_date(&self, account_id: &str) -> Result<Option<NaiveDate>> {
        let mut conn = get_connection(&self.pool)?;
        let earliest: Option<String> = movements::table
            .filter(movements::account_id.eq(account_id))
            .select(diesel::dsl::min(movements::event_timestamp))
            .first(&mut conn)
            .map_err(StorageError::from)?;
        Ok(earliest
            .as_deref()
            .and_then(|ts| ts.get(..10))
            .and_then(|date| NaiveDate::parse_from_str(date, DATE_FORMAT).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations, spawn_writer};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;
    use tradelens_core::movements::{MovementKind, TradeSide};

    async fn create_test_repository() -> (MovementRepository, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let pool = create_pool(&db_path.to_string_lossy()).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer((*pool).clone());
        (MovementRepository::new(pool, writer), temp_dir)
    }

    fn trade(id: &str, instrument: &str, y: i32, m: u32, d: u32, h: u32) -> Movement {
        Movement {
            id: id.to_string(),
            kind: MovementKind::Trade,
            account_id: "acct-1".to_string(),
            instrument_id: Some(instrument.to_string()),
            currency: "USD".to_string(),
            timestamp: Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
            quantity: Some(dec!(10)),
            gross_amount: Some(dec!(1000)),
            commission: Some(dec!(1)),
            fee: None,
            side: Some(TradeSide::Buy),
        }
    }

    fn deposit(id: &str, y: i32, m: u32, d: u32) -> Movement {
        Movement {
            id: id.to_string(),
            kind: MovementKind::CashTransfer,
            account_id: "acct-1".to_string(),
            instrument_id: None,
            currency: "USD".to_string(),
            timestamp: Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap(),
            quantity: None,
            gross_amount: Some(dec!(5000)),
            commission: None,
            fee: None,
            side: None,
        }
    }

    #[tokio::test]
    async fn test_get_in_range_filters_by_instrument_but_keeps_cash() {
        let (repo, _temp_dir) = create_test_repository().await;
        repo.save_movements(&[
            deposit("m1", 2025, 3, 1),
            trade("m2", "AAPL", 2025, 3, 2, 10),
            trade("m3", "MSFT", 2025, 3, 2, 11),
            trade("m4", "AAPL", 2025, 3, 5, 10),
        ])
        .await
        .expect("save failed");

        let loaded = repo
            .get_in_range(
                "acct-1",
                &["AAPL".to_string()],
                NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            )
            .expect("read failed");

        // Cash movements carry no instrument and always pass the filter;
        // the MSFT trade and the out-of-range AAPL trade do not.
        let ids: Vec<&str> = loaded.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_reimported_id_replaces_stored_row() {
        let (repo, _temp_dir) = create_test_repository().await;
        repo.save_movements(&[trade("m1", "AAPL", 2025, 3, 2, 10)])
            .await
            .expect("save failed");

        let mut corrected = trade("m1", "AAPL", 2025, 3, 2, 10);
        corrected.gross_amount = Some(dec!(1100));
        repo.save_movements(&[corrected]).await.expect("re-save failed");

        let loaded = repo
            .get_for_instrument("acct-1", "AAPL")
            .expect("read failed");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].gross_amount, Some(dec!(1100)));
    }

    #[tokio::test]
    async fn test_get_earliest_date() {
        let (repo, _temp_dir) = create_test_repository().await;
        assert_eq!(repo.get_earliest_date("acct-1").expect("read failed"), None);

        repo.save_movements(&[
            trade("m2", "AAPL", 2025, 3, 2, 10),
            deposit("m1", 2025, 2, 14),
        ])
        .await
        .expect("save failed");

        assert_eq!(
            repo.get_earliest_date("acct-1").expect("read failed"),
            NaiveDate::from_ymd_opt(2025, 2, 14)
        );
    }
}
