//! Orchestration of operation matching and snapshot calculation.
//!
//! Two processing paths share the same calculation code:
//!
//! - bulk batch mode for imports and forced recalculation: one prefetch,
//!   one chronological replay, one persistence transaction;
//! - per-date incremental mode for single movements, also used as the
//!   automatic fallback when a batch run fails to persist.
//!
//! While a batch runs, `is_batch_running` reports it so callers can defer
//! or reroute single-movement work instead of interleaving with the bulk
//! write.

use chrono::{NaiveDate, Utc};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::batch::{BatchCalculator, BatchLoader, BatchMetrics, BatchRunResult};
use crate::errors::Result;
use crate::events::{DomainEvent, DomainEventSink};
use crate::movements::{Movement, MovementRepositoryTrait};
use crate::operations::{Operation, OperationMatcher, OperationRepositoryTrait};
use crate::prices::PriceRepositoryTrait;
use crate::snapshot::SnapshotRepositoryTrait;

/// RAII marker for an in-progress batch run. Engaged on entry, released
/// on drop, panic-safe.
struct BatchModeGuard {
    flag: Arc<AtomicBool>,
}

impl BatchModeGuard {
    fn engage(flag: Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        BatchModeGuard { flag }
    }
}

impl Drop for BatchModeGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct ProcessingCoordinator {
    movement_repository: Arc<dyn MovementRepositoryTrait>,
    operation_repository: Arc<dyn OperationRepositoryTrait>,
    snapshot_repository: Arc<dyn SnapshotRepositoryTrait>,
    price_repository: Arc<dyn PriceRepositoryTrait>,
    event_sink: Arc<dyn DomainEventSink>,
    batch_running: Arc<AtomicBool>,
}

impl ProcessingCoordinator {
    pub fn new(
        movement_repository: Arc<dyn MovementRepositoryTrait>,
        operation_repository: Arc<dyn OperationRepositoryTrait>,
        snapshot_repository: Arc<dyn SnapshotRepositoryTrait>,
        price_repository: Arc<dyn PriceRepositoryTrait>,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        ProcessingCoordinator {
            movement_repository,
            operation_repository,
            snapshot_repository,
            price_repository,
            event_sink,
            batch_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while a bulk batch run is in progress.
    pub fn is_batch_running(&self) -> bool {
        self.batch_running.load(Ordering::SeqCst)
    }

    /// Bulk path after an import: regenerates operations for the affected
    /// instruments, then replays the full affected history into snapshots.
    /// Falls back to per-date incremental processing if the batch fails.
    pub async fn process_import(
        &self,
        account_id: &str,
        instrument_ids: &[String],
    ) -> Result<BatchRunResult> {
        let _guard = BatchModeGuard::engage(self.batch_running.clone());

        self.rematch_operations(account_id, instrument_ids).await?;

        let today = Utc::now().date_naive();
        let start = match self.movement_repository.get_earliest_date(account_id)? {
            Some(date) => date,
            None => {
                info!("Account {} has no movements; nothing to process", account_id);
                return Ok(BatchRunResult::Completed(BatchMetrics::default()));
            }
        };

        let result = match self
            .run_batch(account_id, instrument_ids, start, today, false)
            .await
        {
            Ok(metrics) => BatchRunResult::Completed(metrics),
            Err(err) => {
                warn!(
                    "Batch run for account {} failed ({}); falling back to per-date mode",
                    account_id, err
                );
                self.run_per_date(account_id, instrument_ids, start, today)
                    .await
            }
        };

        if result.is_completed() {
            self.emit_changed(account_id, instrument_ids);
        }
        Ok(result)
    }

    /// Per-date incremental path for one movement: regenerates operations
    /// for its instrument and recomputes snapshots from the movement's date
    /// through today, resuming from the persisted baseline.
    pub async fn process_movement(&self, movement: &Movement) -> Result<()> {
        movement.validate()?;

        let account_id = movement.account_id.clone();
        let instrument_ids: Vec<String> = movement.instrument_id.iter().cloned().collect();
        self.rematch_operations(&account_id, &instrument_ids).await?;

        let today = Utc::now().date_naive();
        let metrics = self
            .run_batch(&account_id, &instrument_ids, movement.date(), today, false)
            .await?;
        info!(
            "Processed movement {}: {} rows in {} ms",
            movement.id, metrics.instrument_rows, metrics.duration_ms
        );

        self.emit_changed(&account_id, &instrument_ids);
        Ok(())
    }

    /// Forced full recalculation: clears all persisted snapshots of the
    /// account and rebuilds them from the complete movement history.
    pub async fn recalculate_all(
        &self,
        account_id: &str,
        instrument_ids: &[String],
    ) -> Result<BatchRunResult> {
        let _guard = BatchModeGuard::engage(self.batch_running.clone());

        self.rematch_operations(account_id, instrument_ids).await?;

        let today = Utc::now().date_naive();
        let start = match self.movement_repository.get_earliest_date(account_id)? {
            Some(date) => date,
            None => return Ok(BatchRunResult::Completed(BatchMetrics::default())),
        };

        let deleted = self
            .snapshot_repository
            .delete_in_range(account_id, start, today)
            .await?;
        info!(
            "Forced recalculation for account {}: cleared {} snapshot rows",
            account_id, deleted
        );

        let metrics = self
            .run_batch(account_id, instrument_ids, start, today, true)
            .await?;
        self.emit_changed(account_id, instrument_ids);
        Ok(BatchRunResult::Completed(metrics))
    }

    /// One load-calculate-persist cycle over `[start, end]`.
    async fn run_batch(
        &self,
        account_id: &str,
        instrument_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
        force: bool,
    ) -> Result<BatchMetrics> {
        let loader = BatchLoader::new(
            self.movement_repository.clone(),
            self.snapshot_repository.clone(),
            self.price_repository.clone(),
        );
        let data = loader.load(account_id, instrument_ids, start, end, force)?;
        let output = BatchCalculator::new(account_id).calculate(&data);

        self.snapshot_repository
            .upsert_many(&output.instrument_snapshots, &output.account_snapshots)
            .await?;

        info!(
            "Batch for account {}: {} dates, {} cells, {} instrument rows, {} account rows in {} ms",
            account_id,
            output.metrics.dates_processed,
            output.metrics.cells_calculated,
            output.metrics.instrument_rows,
            output.metrics.account_rows,
            output.metrics.duration_ms,
        );
        Ok(output.metrics)
    }

    /// Fallback: processes each movement date in its own cycle so one bad
    /// transaction cannot sink the whole range. Later dates resume from the
    /// rows persisted for earlier ones.
    async fn run_per_date(
        &self,
        account_id: &str,
        instrument_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> BatchRunResult {
        let loader = BatchLoader::new(
            self.movement_repository.clone(),
            self.snapshot_repository.clone(),
            self.price_repository.clone(),
        );
        let dates = match loader.load(account_id, instrument_ids, start, end, false) {
            Ok(data) => data.movement_dates(),
            Err(err) => return BatchRunResult::Failed(err.to_string()),
        };

        let mut total = BatchMetrics::default();
        for date in dates {
            match self
                .run_batch(account_id, instrument_ids, date, date, false)
                .await
            {
                Ok(metrics) => {
                    total.dates_processed += metrics.dates_processed;
                    total.cells_calculated += metrics.cells_calculated;
                    total.instrument_rows += metrics.instrument_rows;
                    total.account_rows += metrics.account_rows;
                    total.duration_ms += metrics.duration_ms;
                    total.cell_errors.extend(metrics.cell_errors);
                }
                Err(err) => {
                    return BatchRunResult::Failed(format!(
                        "Per-date fallback stopped at {}: {}",
                        date, err
                    ));
                }
            }
        }
        BatchRunResult::Completed(total)
    }

    /// Regenerates the operations of the given instruments from their full
    /// movement history and replaces the persisted set atomically.
    async fn rematch_operations(&self, account_id: &str, instrument_ids: &[String]) -> Result<()> {
        if instrument_ids.is_empty() {
            return Ok(());
        }

        let matcher = OperationMatcher::new();
        let mut operations: Vec<Operation> = Vec::new();
        for instrument_id in instrument_ids {
            let history = self
                .movement_repository
                .get_for_instrument(account_id, instrument_id)?;

            // The matcher works per settlement currency.
            let mut currencies: Vec<String> =
                history.iter().map(|m| m.currency.clone()).collect();
            currencies.sort_unstable();
            currencies.dedup();
            for currency in currencies {
                let subset: Vec<Movement> = history
                    .iter()
                    .filter(|m| m.currency == currency)
                    .cloned()
                    .collect();
                operations.extend(matcher.match_movements(&subset)?);
            }
        }

        let written = self
            .operation_repository
            .replace_for_instruments(account_id, instrument_ids, &operations)
            .await?;
        info!(
            "Regenerated {} operations for account {} ({} instruments)",
            written,
            account_id,
            instrument_ids.len()
        );
        self.event_sink
            .emit(DomainEvent::operations_changed(vec![account_id.to_string()]));
        Ok(())
    }

    fn emit_changed(&self, account_id: &str, instrument_ids: &[String]) {
        self.event_sink.emit(DomainEvent::snapshots_changed(
            vec![account_id.to_string()],
            instrument_ids.to_vec(),
        ));
    }
}
