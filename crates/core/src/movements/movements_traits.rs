//! Repository trait for movements.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::Movement;
use crate::errors::Result;

/// Key identifying one running snapshot series: an instrument in one
/// settlement currency. Cash-only movements use `instrument_id = None`
/// and are aggregated at the account level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MovementKey {
    pub instrument_id: String,
    pub currency: String,
}

/// Movements grouped per (instrument, currency), date-ordered within each key.
pub type GroupedMovements = BTreeMap<MovementKey, BTreeMap<NaiveDate, Vec<Movement>>>;

/// Read-side repository for movements. All operations accept multi-id
/// batches; the engine never issues per-id query loops.
pub trait MovementRepositoryTrait: Send + Sync {
    /// All movements for the account within `[start, end]`, restricted to the
    /// given instruments (cash movements without an instrument are always
    /// included). One bulk query.
    fn get_in_range(
        &self,
        account_id: &str,
        instrument_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Movement>>;

    /// Complete movement history for one instrument in the account,
    /// timestamp-ordered.
    fn get_for_instrument(&self, account_id: &str, instrument_id: &str) -> Result<Vec<Movement>>;

    /// Earliest movement date for the account, if any movements exist.
    fn get_earliest_date(&self, account_id: &str) -> Result<Option<NaiveDate>>;
}

/// Groups movements by (instrument, currency) and date. Cash movements
/// (no instrument) are returned separately, keyed by currency.
pub fn group_by_key_and_date(
    movements: Vec<Movement>,
) -> (GroupedMovements, BTreeMap<String, BTreeMap<NaiveDate, Vec<Movement>>>) {
    let mut grouped: GroupedMovements = BTreeMap::new();
    let mut cash: BTreeMap<String, BTreeMap<NaiveDate, Vec<Movement>>> = BTreeMap::new();

    for movement in movements {
        let date = movement.date();
        match movement.instrument_id.clone() {
            Some(instrument_id) => {
                grouped
                    .entry(MovementKey {
                        instrument_id,
                        currency: movement.currency.clone(),
                    })
                    .or_default()
                    .entry(date)
                    .or_default()
                    .push(movement);
            }
            None => {
                cash.entry(movement.currency.clone())
                    .or_default()
                    .entry(date)
                    .or_default()
                    .push(movement);
            }
        }
    }

    // Within one date, replay in timestamp order.
    for per_date in grouped.values_mut() {
        for day in per_date.values_mut() {
            day.sort_by_key(|m| m.timestamp);
        }
    }
    for per_date in cash.values_mut() {
        for day in per_date.values_mut() {
            day.sort_by_key(|m| m.timestamp);
        }
    }

    (grouped, cash)
}
