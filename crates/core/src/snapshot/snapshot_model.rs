//! Snapshot domain models.
//!
//! Snapshots come in two granularities with the same shape: per-instrument
//! (a per-date parent row owning per-currency children) and per-account
//! (flat per-currency rows, the broker-level counterpart). Both are fully
//! derived from movement history and can be regenerated at any time.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::constants::QUANTITY_THRESHOLD;

/// Quantities below the threshold count as zero (closed position).
pub fn is_quantity_significant(quantity: &Decimal) -> bool {
    let threshold =
        Decimal::from_str(QUANTITY_THRESHOLD).unwrap_or_else(|_| Decimal::new(1, 8));
    quantity.abs() >= threshold
}

/// Kind of open lot carried in a snapshot's running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotKind {
    Share,
    OptionContract,
}

/// One unmatched opening contribution, carried inside the snapshot row so a
/// baseline loaded from storage fully restores running state.
///
/// `cash_flow` is the signed net cash at open: negative for purchases,
/// positive for premium received on short openings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenLot {
    pub kind: LotKind,
    /// Signed: positive long, negative short.
    pub quantity: Decimal,
    pub cash_flow: Decimal,
    pub opened: NaiveDate,
}

/// Cumulative financial figures shared by both snapshot granularities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFigures {
    pub total_shares: Decimal,
    pub cost_basis: Decimal,
    pub realized_gains: Decimal,
    pub realized_pct: Decimal,
    pub unrealized_gains: Decimal,
    pub unrealized_pct: Decimal,
    pub options_income: Decimal,
    pub dividends_received: Decimal,
    pub other_income: Decimal,
    pub commissions: Decimal,
    pub fees: Decimal,
    /// Net invested cash (negative when more cash left than arrived).
    pub net_cash_flow: Decimal,
    pub has_open_trades: bool,
}

impl SnapshotFigures {
    /// Adds another figure set field by field (mark-to-market percentages
    /// are recomputed by the caller afterwards).
    pub fn accumulate(&mut self, other: &SnapshotFigures) {
        self.total_shares += other.total_shares;
        self.cost_basis += other.cost_basis;
        self.realized_gains += other.realized_gains;
        self.unrealized_gains += other.unrealized_gains;
        self.options_income += other.options_income;
        self.dividends_received += other.dividends_received;
        self.other_income += other.other_income;
        self.commissions += other.commissions;
        self.fees += other.fees;
        self.net_cash_flow += other.net_cash_flow;
        self.has_open_trades |= other.has_open_trades;
    }

    /// Recomputes the percentage fields against cost basis.
    pub fn refresh_percentages(&mut self) {
        if self.cost_basis > Decimal::ZERO {
            self.realized_pct = Decimal::ONE_HUNDRED * self.realized_gains / self.cost_basis;
            self.unrealized_pct = Decimal::ONE_HUNDRED * self.unrealized_gains / self.cost_basis;
        } else {
            self.realized_pct = Decimal::ZERO;
            self.unrealized_pct = Decimal::ZERO;
        }
    }
}

/// Per-currency snapshot of one instrument on one date. Child row of an
/// `InstrumentSnapshot`; `parent_id` is only known once the parent row has
/// been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencySnapshot {
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub account_id: String,
    pub instrument_id: String,
    pub currency: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub figures: SnapshotFigures,
    /// FIFO-ordered open lots; running state for the next date.
    #[serde(default)]
    pub open_lots: Vec<OpenLot>,
    pub calculated_at: NaiveDateTime,
}

impl CurrencySnapshot {
    /// Zero baseline for a key that has never appeared before.
    pub fn baseline(account_id: &str, instrument_id: &str, currency: &str) -> Self {
        CurrencySnapshot {
            parent_id: None,
            account_id: account_id.to_string(),
            instrument_id: instrument_id.to_string(),
            currency: currency.to_string(),
            date: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
            figures: SnapshotFigures::default(),
            open_lots: Vec::new(),
            calculated_at: Utc::now().naive_utc(),
        }
    }
}

/// Per-date parent snapshot of one instrument, owning per-currency children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentSnapshot {
    /// Database-generated identity; `None` until first persisted.
    #[serde(default)]
    pub id: Option<i64>,
    pub account_id: String,
    pub instrument_id: String,
    pub date: NaiveDate,
    pub calculated_at: NaiveDateTime,
    pub currencies: Vec<CurrencySnapshot>,
}

/// Per-currency account snapshot for one date - the broker-level
/// counterpart, same shape as the instrument figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    #[serde(default)]
    pub id: Option<i64>,
    pub account_id: String,
    pub currency: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub figures: SnapshotFigures,
    pub calculated_at: NaiveDateTime,
}

impl AccountSnapshot {
    pub fn baseline(account_id: &str, currency: &str) -> Self {
        AccountSnapshot {
            id: None,
            account_id: account_id.to_string(),
            currency: currency.to_string(),
            date: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
            figures: SnapshotFigures::default(),
            calculated_at: Utc::now().naive_utc(),
        }
    }
}
