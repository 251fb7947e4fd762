//! Batch calculation data carriers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::movements::{GroupedMovements, Movement, MovementKey};
use crate::snapshot::{AccountSnapshot, CurrencySnapshot};

/// Everything the batch calculator needs, prefetched with a constant
/// number of bulk queries. The calculation itself performs no I/O.
#[derive(Debug, Default)]
pub struct BatchLoadData {
    /// Latest persisted state per key strictly before the range start.
    pub baselines: BTreeMap<MovementKey, CurrencySnapshot>,
    /// Latest account-level state per currency strictly before the start.
    pub account_baselines: BTreeMap<String, AccountSnapshot>,
    /// Instrument movements in range, grouped by key and date.
    pub movements: GroupedMovements,
    /// Cash movements in range (no instrument), keyed by currency and date.
    pub cash_movements: BTreeMap<String, BTreeMap<NaiveDate, Vec<Movement>>>,
    /// Closing prices in range, for forward-filled mark-to-market.
    pub prices: BTreeMap<(String, String), BTreeMap<NaiveDate, Decimal>>,
    /// Database ids of already persisted instrument rows, keyed by
    /// (instrument_id, date). Recalculated rows adopt these identities.
    pub existing_instrument_ids: BTreeMap<(String, NaiveDate), i64>,
    /// Database ids of already persisted account rows, keyed by
    /// (currency, date).
    pub existing_account_ids: BTreeMap<(String, NaiveDate), i64>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BatchLoadData {
    /// Latest known close on or before `date`, forward-filled within the
    /// loaded range.
    pub fn price_at(&self, instrument_id: &str, currency: &str, date: NaiveDate) -> Option<Decimal> {
        self.prices
            .get(&(instrument_id.to_string(), currency.to_string()))
            .and_then(|by_date| by_date.range(..=date).next_back())
            .map(|(_, close)| *close)
    }

    /// Union of all dates on which any movement occurred. Snapshot rows are
    /// only materialized for these dates.
    pub fn movement_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .movements
            .values()
            .flat_map(|by_date| by_date.keys().copied())
            .chain(
                self.cash_movements
                    .values()
                    .flat_map(|by_date| by_date.keys().copied()),
            )
            .collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }
}

/// One failed (instrument, currency, date) cell. Cell failures are
/// recorded and skipped; they never abort the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellError {
    pub instrument_id: String,
    pub currency: String,
    pub date: NaiveDate,
    pub message: String,
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} on {}: {}",
            self.instrument_id, self.currency, self.date, self.message
        )
    }
}

/// Summary of one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetrics {
    pub dates_processed: usize,
    pub cells_calculated: usize,
    pub instrument_rows: usize,
    pub account_rows: usize,
    pub duration_ms: u64,
    pub cell_errors: Vec<CellError>,
}

/// Outcome of a batch run, tagged so callers can tell a completed run
/// (possibly with per-cell errors) from one that never persisted.
#[derive(Debug)]
pub enum BatchRunResult {
    Completed(BatchMetrics),
    Failed(String),
}

impl BatchRunResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, BatchRunResult::Completed(_))
    }
}
