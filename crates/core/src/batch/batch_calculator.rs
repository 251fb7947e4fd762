//! Chronological batch snapshot calculation.
//!
//! Replays the prefetched range date by date, folding each day's movements
//! onto per-key running state and aggregating the per-instrument cells into
//! account-level rows. Pure computation: persistence happens afterwards in
//! one transaction.
//!
//! Snapshot rows are materialized only for dates on which the account had
//! at least one movement; on such a date every known key gets a row, with
//! movement-free keys carried forward.

use chrono::NaiveDate;
use log::{error, warn};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::time::Instant;

use super::{BatchLoadData, BatchMetrics, CellError};
use crate::movements::{Movement, MovementKey};
use crate::snapshot::{
    carry_forward, continue_from, first_appearance, AccountSnapshot, CurrencySnapshot,
    InstrumentSnapshot, SnapshotFigures,
};

/// Result of one batch calculation, ready for persistence.
#[derive(Debug, Default)]
pub struct BatchOutput {
    pub instrument_snapshots: Vec<InstrumentSnapshot>,
    pub account_snapshots: Vec<AccountSnapshot>,
    pub metrics: BatchMetrics,
}

pub struct BatchCalculator {
    account_id: String,
}

impl BatchCalculator {
    pub fn new(account_id: &str) -> Self {
        BatchCalculator {
            account_id: account_id.to_string(),
        }
    }

    pub fn calculate(&self, data: &BatchLoadData) -> BatchOutput {
        let started = Instant::now();
        let mut output = BatchOutput::default();

        // Running per-key state, seeded from the persisted baselines.
        let mut states: BTreeMap<MovementKey, CurrencySnapshot> = data.baselines.clone();

        // Account-level cash that is not attributable to any instrument
        // (transfers). Seeded as the account baseline's net flow minus what
        // the instrument baselines already explain.
        let mut cash_flow: BTreeMap<String, Decimal> = BTreeMap::new();
        for (currency, baseline) in &data.account_baselines {
            let instrument_part: Decimal = states
                .values()
                .filter(|s| &s.currency == currency)
                .map(|s| s.figures.net_cash_flow)
                .sum();
            cash_flow.insert(
                currency.clone(),
                baseline.figures.net_cash_flow - instrument_part,
            );
        }

        for date in data.movement_dates() {
            output.metrics.dates_processed += 1;
            self.calculate_date(data, date, &mut states, &mut cash_flow, &mut output);
        }

        output.metrics.instrument_rows = output.instrument_snapshots.len();
        output.metrics.account_rows = output.account_snapshots.len();
        output.metrics.duration_ms = started.elapsed().as_millis() as u64;
        if !output.metrics.cell_errors.is_empty() {
            error!(
                "Batch calculation for account {} finished with {} cell errors",
                self.account_id,
                output.metrics.cell_errors.len()
            );
        }
        output
    }

    fn calculate_date(
        &self,
        data: &BatchLoadData,
        date: NaiveDate,
        states: &mut BTreeMap<MovementKey, CurrencySnapshot>,
        cash_flow: &mut BTreeMap<String, Decimal>,
        output: &mut BatchOutput,
    ) {
        // Every key that has appeared so far gets a row on a movement date.
        let mut keys: Vec<MovementKey> = states.keys().cloned().collect();
        for key in data.movements.keys() {
            if !states.contains_key(key) && data.movements[key].contains_key(&date) {
                keys.push(key.clone());
            }
        }

        let mut cells: Vec<CurrencySnapshot> = Vec::with_capacity(keys.len());
        for key in keys {
            let day_movements = data
                .movements
                .get(&key)
                .and_then(|by_date| by_date.get(&date));
            let mark_price = data.price_at(&key.instrument_id, &key.currency, date);

            let next = match (states.get(&key), day_movements) {
                (Some(previous), Some(movements)) => {
                    continue_from(previous, movements, date, mark_price)
                }
                (None, Some(movements)) => first_appearance(
                    &self.account_id,
                    &key.instrument_id,
                    &key.currency,
                    movements,
                    date,
                    mark_price,
                ),
                (Some(previous), None) => Ok(carry_forward(previous, date, mark_price)),
                (None, None) => continue,
            };
            output.metrics.cells_calculated += 1;

            match next {
                Ok(snapshot) => {
                    states.insert(key, snapshot.clone());
                    cells.push(snapshot);
                }
                Err(err) => {
                    warn!(
                        "Snapshot cell {}/{} on {} failed: {}",
                        key.instrument_id, key.currency, date, err
                    );
                    output.metrics.cell_errors.push(CellError {
                        instrument_id: key.instrument_id.clone(),
                        currency: key.currency.clone(),
                        date,
                        message: err.to_string(),
                    });
                    // Keep yesterday's state so later dates still compute.
                    if let Some(previous) = states.get(&key).cloned() {
                        let carried = carry_forward(&previous, date, mark_price);
                        states.insert(key, carried.clone());
                        cells.push(carried);
                    }
                }
            }
        }

        self.collect_instrument_rows(data, date, cells, output);
        self.collect_account_rows(data, date, states, cash_flow, output);
    }

    /// Groups the date's cells under per-instrument parent rows, adopting
    /// the identity of already persisted rows where one exists.
    fn collect_instrument_rows(
        &self,
        data: &BatchLoadData,
        date: NaiveDate,
        cells: Vec<CurrencySnapshot>,
        output: &mut BatchOutput,
    ) {
        let mut by_instrument: BTreeMap<String, Vec<CurrencySnapshot>> = BTreeMap::new();
        for cell in cells {
            by_instrument
                .entry(cell.instrument_id.clone())
                .or_default()
                .push(cell);
        }

        for (instrument_id, mut currencies) in by_instrument {
            let existing_id = data
                .existing_instrument_ids
                .get(&(instrument_id.clone(), date))
                .copied();
            if let Some(id) = existing_id {
                for child in &mut currencies {
                    child.parent_id = Some(id);
                }
            }
            let calculated_at = currencies
                .first()
                .map(|c| c.calculated_at)
                .unwrap_or_else(|| chrono::Utc::now().naive_utc());
            output.instrument_snapshots.push(InstrumentSnapshot {
                id: existing_id,
                account_id: self.account_id.clone(),
                instrument_id,
                date,
                calculated_at,
                currencies,
            });
        }
    }

    /// Aggregates the running per-key states into one account row per
    /// currency, adding the unattributed cash flow from transfers.
    fn collect_account_rows(
        &self,
        data: &BatchLoadData,
        date: NaiveDate,
        states: &BTreeMap<MovementKey, CurrencySnapshot>,
        cash_flow: &mut BTreeMap<String, Decimal>,
        output: &mut BatchOutput,
    ) {
        for (currency, by_date) in &data.cash_movements {
            if let Some(day) = by_date.get(&date) {
                let delta: Decimal = day.iter().map(Movement::net_cash_flow).sum();
                *cash_flow.entry(currency.clone()).or_default() += delta;
            }
        }

        let mut currencies: Vec<String> = states
            .values()
            .map(|s| s.currency.clone())
            .chain(cash_flow.keys().cloned())
            .collect();
        currencies.sort_unstable();
        currencies.dedup();

        for currency in currencies {
            let mut figures = SnapshotFigures::default();
            for state in states.values().filter(|s| s.currency == currency) {
                figures.accumulate(&state.figures);
            }
            figures.net_cash_flow += cash_flow.get(&currency).copied().unwrap_or(Decimal::ZERO);
            figures.refresh_percentages();

            let mut row = AccountSnapshot::baseline(&self.account_id, &currency);
            row.id = data
                .existing_account_ids
                .get(&(currency.clone(), date))
                .copied();
            row.date = date;
            row.figures = figures;
            output.account_snapshots.push(row);
        }
    }
}
