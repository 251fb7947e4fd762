//! Database models for snapshot rows.
//!
//! Snapshots are stored as a parent row per (account, instrument, date)
//! with one child row per settlement currency. Parent ids come from the
//! database (AUTOINCREMENT); children are never written before their
//! parent's id is known. All money fields are TEXT-encoded decimals, and
//! the FIFO open-lot state is carried as a JSON column so a baseline row
//! fully restores running state.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use tradelens_core::constants::{DATE_FORMAT, DECIMAL_PRECISION, TIMESTAMP_FORMAT};
use tradelens_core::snapshot::{AccountSnapshot, CurrencySnapshot, SnapshotFigures};

pub(crate) fn parse_decimal(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or_default()
}

pub(crate) fn decimal_text(value: Decimal) -> String {
    value.round_dp(DECIMAL_PRECISION).to_string()
}

pub(crate) fn parse_date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, DATE_FORMAT).unwrap_or_default()
}

pub(crate) fn parse_calculated_at(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).unwrap_or_else(|e| {
        log::error!("Failed to parse DB calculated_at '{}': {}", value, e);
        Utc::now().naive_utc()
    })
}

/// New parent row; the id comes back from the insert.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::instrument_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewInstrumentSnapshotRow {
    pub account_id: String,
    pub instrument_id: String,
    pub snapshot_date: String,
    pub calculated_at: String,
}

/// Per-currency child row.
#[derive(
    Debug, Clone, Queryable, QueryableByName, Selectable, Insertable, Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::instrument_currency_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct CurrencySnapshotDB {
    pub parent_id: i64,
    pub account_id: String,
    pub instrument_id: String,
    pub currency: String,
    pub snapshot_date: String,
    pub total_shares: String,
    pub cost_basis: String,
    pub realized_gains: String,
    pub realized_pct: String,
    pub unrealized_gains: String,
    pub unrealized_pct: String,
    pub options_income: String,
    pub dividends_received: String,
    pub other_income: String,
    pub commissions: String,
    pub fees: String,
    pub net_cash_flow: String,
    pub has_open_trades: bool,
    pub open_lots: String,
    pub calculated_at: String,
}

impl CurrencySnapshotDB {
    pub fn from_domain(domain: &CurrencySnapshot, parent_id: i64) -> Self {
        CurrencySnapshotDB {
            parent_id,
            account_id: domain.account_id.clone(),
            instrument_id: domain.instrument_id.clone(),
            currency: domain.currency.clone(),
            snapshot_date: domain.date.format(DATE_FORMAT).to_string(),
            total_shares: decimal_text(domain.figures.total_shares),
            cost_basis: decimal_text(domain.figures.cost_basis),
            realized_gains: decimal_text(domain.figures.realized_gains),
            realized_pct: decimal_text(domain.figures.realized_pct),
            unrealized_gains: decimal_text(domain.figures.unrealized_gains),
            unrealized_pct: decimal_text(domain.figures.unrealized_pct),
            options_income: decimal_text(domain.figures.options_income),
            dividends_received: decimal_text(domain.figures.dividends_received),
            other_income: decimal_text(domain.figures.other_income),
            commissions: decimal_text(domain.figures.commissions),
            fees: decimal_text(domain.figures.fees),
            net_cash_flow: decimal_text(domain.figures.net_cash_flow),
            has_open_trades: domain.figures.has_open_trades,
            open_lots: serde_json::to_string(&domain.open_lots)
                .unwrap_or_else(|_| "[]".to_string()),
            calculated_at: domain.calculated_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl From<CurrencySnapshotDB> for CurrencySnapshot {
    fn from(db: CurrencySnapshotDB) -> Self {
        CurrencySnapshot {
            parent_id: Some(db.parent_id),
            account_id: db.account_id,
            instrument_id: db.instrument_id,
            currency: db.currency,
            date: parse_date(&db.snapshot_date),
            figures: SnapshotFigures {
                total_shares: parse_decimal(&db.total_shares),
                cost_basis: parse_decimal(&db.cost_basis),
                realized_gains: parse_decimal(&db.realized_gains),
                realized_pct: parse_decimal(&db.realized_pct),
                unrealized_gains: parse_decimal(&db.unrealized_gains),
                unrealized_pct: parse_decimal(&db.unrealized_pct),
                options_income: parse_decimal(&db.options_income),
                dividends_received: parse_decimal(&db.dividends_received),
                other_income: parse_decimal(&db.other_income),
                commissions: parse_decimal(&db.commissions),
                fees: parse_decimal(&db.fees),
                net_cash_flow: parse_decimal(&db.net_cash_flow),
                has_open_trades: db.has_open_trades,
            },
            open_lots: serde_json::from_str(&db.open_lots).unwrap_or_default(),
            calculated_at: parse_calculated_at(&db.calculated_at),
        }
    }
}

/// Account-level row, upserted on (account, currency, date).
#[derive(
    Debug,
    Clone,
    Queryable,
    QueryableByName,
    Selectable,
    Insertable,
    AsChangeset,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::account_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshotDB {
    pub account_id: String,
    pub currency: String,
    pub snapshot_date: String,
    pub total_shares: String,
    pub cost_basis: String,
    pub realized_gains: String,
    pub realized_pct: String,
    pub unrealized_gains: String,
    pub unrealized_pct: String,
    pub options_income: String,
    pub dividends_received: String,
    pub other_income: String,
    pub commissions: String,
    pub fees: String,
    pub net_cash_flow: String,
    pub has_open_trades: bool,
    pub calculated_at: String,
}

impl From<AccountSnapshot> for AccountSnapshotDB {
    fn from(domain: AccountSnapshot) -> Self {
        AccountSnapshotDB {
            account_id: domain.account_id,
            currency: domain.currency,
            snapshot_date: domain.date.format(DATE_FORMAT).to_string(),
            total_shares: decimal_text(domain.figures.total_shares),
            cost_basis: decimal_text(domain.figures.cost_basis),
            realized_gains: decimal_text(domain.figures.realized_gains),
            realized_pct: decimal_text(domain.figures.realized_pct),
            unrealized_gains: decimal_text(domain.figures.unrealized_gains),
            unrealized_pct: decimal_text(domain.figures.unrealized_pct),
            options_income: decimal_text(domain.figures.options_income),
            dividends_received: decimal_text(domain.figures.dividends_received),
            other_income: decimal_text(domain.figures.other_income),
            commissions: decimal_text(domain.figures.commissions),
            fees: decimal_text(domain.figures.fees),
            net_cash_flow: decimal_text(domain.figures.net_cash_flow),
            has_open_trades: domain.figures.has_open_trades,
            calculated_at: domain.calculated_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl AccountSnapshotDB {
    /// Rehydrates the domain row; the database id is supplied by the caller
    /// because this struct is also used for inserts, which carry none.
    pub fn into_domain(self, id: Option<i64>) -> AccountSnapshot {
        AccountSnapshot {
            id,
            account_id: self.account_id,
            currency: self.currency,
            date: parse_date(&self.snapshot_date),
            figures: SnapshotFigures {
                total_shares: parse_decimal(&self.total_shares),
                cost_basis: parse_decimal(&self.cost_basis),
                realized_gains: parse_decimal(&self.realized_gains),
                realized_pct: parse_decimal(&self.realized_pct),
                unrealized_gains: parse_decimal(&self.unrealized_gains),
                unrealized_pct: parse_decimal(&self.unrealized_pct),
                options_income: parse_decimal(&self.options_income),
                dividends_received: parse_decimal(&self.dividends_received),
                other_income: parse_decimal(&self.other_income),
                commissions: parse_decimal(&self.commissions),
                fees: parse_decimal(&self.fees),
                net_cash_flow: parse_decimal(&self.net_cash_flow),
                has_open_trades: self.has_open_trades,
            },
            calculated_at: parse_calculated_at(&self.calculated_at),
        }
    }
}
