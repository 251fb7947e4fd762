//! SQLite repository for snapshot persistence.
//!
//! Reads run on pooled connections; every mutation goes through the write
//! actor, so one `upsert_many` or `delete_in_range` call is one immediate
//! transaction. Parent rows are written first and their database ids are
//! taken from the insert's RETURNING clause before any child row is built.

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::sqlite::{Sqlite, SqliteConnection};
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

use tradelens_core::constants::{DATE_FORMAT, TIMESTAMP_FORMAT};
use tradelens_core::snapshot::{AccountSnapshot, InstrumentSnapshot, SnapshotRepositoryTrait};
use tradelens_core::Result;

use super::model::{
    parse_calculated_at, parse_date, AccountSnapshotDB, CurrencySnapshotDB,
    NewInstrumentSnapshotRow,
};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{account_snapshots, instrument_currency_snapshots, instrument_snapshots};

const CURRENCY_SNAPSHOT_COLUMNS: &str = "parent_id, account_id, instrument_id, currency, \
     snapshot_date, total_shares, cost_basis, realized_gains, realized_pct, unrealized_gains, \
     unrealized_pct, options_income, dividends_received, other_income, commissions, fees, \
     net_cash_flow, has_open_trades, open_lots, calculated_at";

const ACCOUNT_SNAPSHOT_COLUMNS: &str = "account_id, currency, snapshot_date, total_shares, \
     cost_basis, realized_gains, realized_pct, unrealized_gains, unrealized_pct, options_income, \
     dividends_received, other_income, commissions, fees, net_cash_flow, has_open_trades, \
     calculated_at";

pub struct SnapshotRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SnapshotRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Groups child rows back into per-instrument parent snapshots.
    fn assemble_parents(children: Vec<CurrencySnapshotDB>) -> Vec<InstrumentSnapshot> {
        let mut grouped: BTreeMap<(String, String), InstrumentSnapshot> = BTreeMap::new();
        for child in children {
            let key = (child.instrument_id.clone(), child.snapshot_date.clone());
            let parent = grouped.entry(key).or_insert_with(|| InstrumentSnapshot {
                id: Some(child.parent_id),
                account_id: child.account_id.clone(),
                instrument_id: child.instrument_id.clone(),
                date: parse_date(&child.snapshot_date),
                calculated_at: parse_calculated_at(&child.calculated_at),
                currencies: Vec::new(),
            });
            parent.currencies.push(child.into());
        }
        grouped.into_values().collect()
    }
}

#[async_trait]
impl SnapshotRepositoryTrait for SnapshotRepository {
    /// Latest child row per (instrument, currency) strictly before `date`,
    /// fetched with one window-function query.
    fn get_latest_before(
        &self,
        account_id: &str,
        instrument_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<InstrumentSnapshot>> {
        if instrument_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = get_connection(&self.pool)?;

        let placeholders: String = instrument_ids
            .iter()
            .map(|_| "?")
            .collect::<Vec<&str>>()
            .join(", ");
        let sql = format!(
            "WITH RankedSnapshots AS ( \
                SELECT {cols}, \
                    ROW_NUMBER() OVER (PARTITION BY instrument_id, currency \
                                       ORDER BY snapshot_date DESC) as rn \
                FROM instrument_currency_snapshots \
                WHERE account_id = ? AND instrument_id IN ({placeholders}) \
                    AND snapshot_date < ? \
            ) \
            SELECT {cols} FROM RankedSnapshots WHERE rn = 1",
            cols = CURRENCY_SNAPSHOT_COLUMNS,
            placeholders = placeholders,
        );

        let mut query = sql_query(sql).into_boxed::<Sqlite>();
        query = query.bind::<Text, _>(account_id.to_string());
        for instrument_id in instrument_ids {
            query = query.bind::<Text, _>(instrument_id);
        }
        query = query.bind::<Text, _>(date.format(DATE_FORMAT).to_string());

        let children: Vec<CurrencySnapshotDB> = query
            .load::<CurrencySnapshotDB>(&mut conn)
            .map_err(StorageError::from)?;

        let mut baselines = Self::assemble_parents(children);
        // Baselines are read-only inputs; clearing their ids keeps later
        // upserts from adopting a row outside the written range.
        for parent in &mut baselines {
            parent.id = None;
        }
        Ok(baselines)
    }

    fn get_in_range(
        &self,
        account_id: &str,
        instrument_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<InstrumentSnapshot>> {
        let mut conn = get_connection(&self.pool)?;
        let children = instrument_currency_snapshots::table
            .filter(instrument_currency_snapshots::account_id.eq(account_id))
            .filter(instrument_currency_snapshots::instrument_id.eq_any(instrument_ids))
            .filter(
                instrument_currency_snapshots::snapshot_date
                    .ge(start.format(DATE_FORMAT).to_string()),
            )
            .filter(
                instrument_currency_snapshots::snapshot_date
                    .le(end.format(DATE_FORMAT).to_string()),
            )
            .order(instrument_currency_snapshots::snapshot_date.asc())
            .select(CurrencySnapshotDB::as_select())
            .load::<CurrencySnapshotDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(Self::assemble_parents(children))
    }

    fn get_account_latest_before(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<AccountSnapshot>> {
        let mut conn = get_connection(&self.pool)?;
        let sql = format!(
            "WITH RankedSnapshots AS ( \
                SELECT {cols}, \
                    ROW_NUMBER() OVER (PARTITION BY currency \
                                       ORDER BY snapshot_date DESC) as rn \
                FROM account_snapshots \
                WHERE account_id = ? AND snapshot_date < ? \
            ) \
            SELECT {cols} FROM RankedSnapshots WHERE rn = 1",
            cols = ACCOUNT_SNAPSHOT_COLUMNS,
        );

        let rows: Vec<AccountSnapshotDB> = sql_query(sql)
            .bind::<Text, _>(account_id.to_string())
            .bind::<Text, _>(date.format(DATE_FORMAT).to_string())
            .load::<AccountSnapshotDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|row| row.into_domain(None)).collect())
    }

    fn get_account_in_range(
        &self,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AccountSnapshot>> {
        let mut conn = get_connection(&self.pool)?;
        let rows: Vec<(i64, AccountSnapshotDB)> = account_snapshots::table
            .filter(account_snapshots::account_id.eq(account_id))
            .filter(account_snapshots::snapshot_date.ge(start.format(DATE_FORMAT).to_string()))
            .filter(account_snapshots::snapshot_date.le(end.format(DATE_FORMAT).to_string()))
            .order(account_snapshots::snapshot_date.asc())
            .select((account_snapshots::id, AccountSnapshotDB::as_select()))
            .load(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows
            .into_iter()
            .map(|(id, row)| row.into_domain(Some(id)))
            .collect())
    }

    async fn upsert_many(
        &self,
        instrument_snapshots_in: &[InstrumentSnapshot],
        account_snapshots_in: &[AccountSnapshot],
    ) -> Result<usize> {
        if instrument_snapshots_in.is_empty() && account_snapshots_in.is_empty() {
            debug!("upsert_many called with nothing to save.");
            return Ok(0);
        }

        let parents = instrument_snapshots_in.to_vec();
        let accounts = account_snapshots_in.to_vec();

        self.writer
            .exec(move |conn| {
                let written = parents.len();
                for parent in parents {
                    upsert_instrument_snapshot(conn, parent)?;
                }
                for account in accounts {
                    let row = AccountSnapshotDB::from(account);
                    diesel::insert_into(account_snapshots::table)
                        .values(&row)
                        .on_conflict((
                            account_snapshots::account_id,
                            account_snapshots::currency,
                            account_snapshots::snapshot_date,
                        ))
                        .do_update()
                        .set(&row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                debug!("Upserted {} instrument snapshot rows", written);
                Ok(written)
            })
            .await
    }

    async fn delete_in_range(
        &self,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize> {
        let account_owned = account_id.to_string();
        let start_str = start.format(DATE_FORMAT).to_string();
        let end_str = end.format(DATE_FORMAT).to_string();

        self.writer
            .exec(move |conn| {
                // Children go with their parents via ON DELETE CASCADE.
                let parents = diesel::delete(
                    instrument_snapshots::table
                        .filter(instrument_snapshots::account_id.eq(&account_owned))
                        .filter(instrument_snapshots::snapshot_date.ge(&start_str))
                        .filter(instrument_snapshots::snapshot_date.le(&end_str)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;

                let accounts = diesel::delete(
                    account_snapshots::table
                        .filter(account_snapshots::account_id.eq(&account_owned))
                        .filter(account_snapshots::snapshot_date.ge(&start_str))
                        .filter(account_snapshots::snapshot_date.le(&end_str)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(parents + accounts)
            })
            .await
    }
}

/// Writes one parent row and its children. Runs inside the write actor's
/// transaction. The parent's id is resolved first (update in place when
/// known, insert-or-update with RETURNING otherwise); children are then
/// replaced wholesale under that id.
fn upsert_instrument_snapshot(
    conn: &mut SqliteConnection,
    parent: InstrumentSnapshot,
) -> Result<()> {
    let new_row = NewInstrumentSnapshotRow {
        account_id: parent.account_id.clone(),
        instrument_id: parent.instrument_id.clone(),
        snapshot_date: parent.date.format(DATE_FORMAT).to_string(),
        calculated_at: parent.calculated_at.format(TIMESTAMP_FORMAT).to_string(),
    };

    let parent_id: i64 = match parent.id {
        Some(id) => {
            diesel::update(instrument_snapshots::table.find(id))
                .set(&new_row)
                .execute(conn)
                .map_err(StorageError::from)?;
            id
        }
        None => diesel::insert_into(instrument_snapshots::table)
            .values(&new_row)
            .on_conflict((
                instrument_snapshots::account_id,
                instrument_snapshots::instrument_id,
                instrument_snapshots::snapshot_date,
            ))
            .do_update()
            .set(instrument_snapshots::calculated_at.eq(new_row.calculated_at.clone()))
            .returning(instrument_snapshots::id)
            .get_result(conn)
            .map_err(StorageError::from)?,
    };

    diesel::delete(
        instrument_currency_snapshots::table
            .filter(instrument_currency_snapshots::parent_id.eq(parent_id)),
    )
    .execute(conn)
    .map_err(StorageError::from)?;

    let children: Vec<CurrencySnapshotDB> = parent
        .currencies
        .iter()
        .map(|child| CurrencySnapshotDB::from_domain(child, parent_id))
        .collect();
    diesel::insert_into(instrument_currency_snapshots::table)
        .values(&children)
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}
