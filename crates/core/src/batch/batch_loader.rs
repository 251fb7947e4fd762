//! Bulk prefetch for batch snapshot calculation.
//!
//! Loads everything one batch run needs with a constant number of bulk
//! queries regardless of range length or instrument count. Per-id query
//! loops are forbidden on this path.

use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::BatchLoadData;
use crate::errors::Result;
use crate::movements::{group_by_key_and_date, MovementKey, MovementRepositoryTrait};
use crate::prices::PriceRepositoryTrait;
use crate::snapshot::SnapshotRepositoryTrait;

pub struct BatchLoader {
    movement_repository: Arc<dyn MovementRepositoryTrait>,
    snapshot_repository: Arc<dyn SnapshotRepositoryTrait>,
    price_repository: Arc<dyn PriceRepositoryTrait>,
}

impl BatchLoader {
    pub fn new(
        movement_repository: Arc<dyn MovementRepositoryTrait>,
        snapshot_repository: Arc<dyn SnapshotRepositoryTrait>,
        price_repository: Arc<dyn PriceRepositoryTrait>,
    ) -> Self {
        BatchLoader {
            movement_repository,
            snapshot_repository,
            price_repository,
        }
    }

    /// Prefetches movements, baselines, prices and existing row identities
    /// for `[start, end]`. With `force` set, baselines and existing rows are
    /// skipped: the caller recalculates from zero into a cleared range.
    pub fn load(
        &self,
        account_id: &str,
        instrument_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
        force: bool,
    ) -> Result<BatchLoadData> {
        let raw = self
            .movement_repository
            .get_in_range(account_id, instrument_ids, start, end)?;
        let movement_count = raw.len();
        let (movements, cash_movements) = group_by_key_and_date(raw);

        let mut data = BatchLoadData {
            movements,
            cash_movements,
            start,
            end,
            ..Default::default()
        };

        let prices = self
            .price_repository
            .get_prices_in_range(instrument_ids, start, end)?;
        for price in prices {
            data.prices
                .entry((price.instrument_id, price.currency))
                .or_insert_with(BTreeMap::new)
                .insert(price.date, price.close);
        }

        if !force {
            let baselines =
                self.snapshot_repository
                    .get_latest_before(account_id, instrument_ids, start)?;
            for parent in baselines {
                for child in parent.currencies {
                    let key = MovementKey {
                        instrument_id: child.instrument_id.clone(),
                        currency: child.currency.clone(),
                    };
                    // One parent per instrument; children carry one currency
                    // each, so keys never collide.
                    data.baselines.insert(key, child);
                }
            }

            let account_baselines = self
                .snapshot_repository
                .get_account_latest_before(account_id, start)?;
            for baseline in account_baselines {
                data.account_baselines
                    .insert(baseline.currency.clone(), baseline);
            }

            let existing =
                self.snapshot_repository
                    .get_in_range(account_id, instrument_ids, start, end)?;
            for parent in existing {
                if let Some(id) = parent.id {
                    data.existing_instrument_ids
                        .insert((parent.instrument_id.clone(), parent.date), id);
                }
            }
            let existing_account = self
                .snapshot_repository
                .get_account_in_range(account_id, start, end)?;
            for row in existing_account {
                if let Some(id) = row.id {
                    data.existing_account_ids
                        .insert((row.currency.clone(), row.date), id);
                }
            }
        }

        debug!(
            "Batch load for account {}: {} movements, {} keys, {} baselines, {} price series",
            account_id,
            movement_count,
            data.movements.len(),
            data.baselines.len(),
            data.prices.len(),
        );
        Ok(data)
    }
}
