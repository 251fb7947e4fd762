//! Repository traits for persisted snapshots.
//!
//! Reads are synchronous (pooled connections); writes go through the
//! storage crate's write actor and are async. One `upsert_many` call is
//! one transaction: either every row lands or none do.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{AccountSnapshot, InstrumentSnapshot};
use crate::errors::Result;

#[async_trait]
pub trait SnapshotRepositoryTrait: Send + Sync {
    /// Latest persisted instrument snapshot strictly before `date`, per
    /// (instrument, currency) key, for the given instruments. These are the
    /// baselines incremental calculation resumes from.
    fn get_latest_before(
        &self,
        account_id: &str,
        instrument_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<InstrumentSnapshot>>;

    /// Instrument snapshots in `[start, end]`, ordered by date.
    fn get_in_range(
        &self,
        account_id: &str,
        instrument_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<InstrumentSnapshot>>;

    /// Latest account-level snapshot per currency strictly before `date`.
    fn get_account_latest_before(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<AccountSnapshot>>;

    /// Account-level snapshots in `[start, end]`, ordered by date.
    fn get_account_in_range(
        &self,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AccountSnapshot>>;

    /// Persists a batch of instrument and account snapshots in a single
    /// transaction. Existing rows for the same (account, instrument, date)
    /// or (account, currency, date) are updated in place, preserving their
    /// database identity. Returns the number of instrument rows written.
    async fn upsert_many(
        &self,
        instrument_snapshots: &[InstrumentSnapshot],
        account_snapshots: &[AccountSnapshot],
    ) -> Result<usize>;

    /// Deletes all snapshots of the account in `[start, end]`, instrument
    /// and account level alike. Used by forced full recalculation.
    async fn delete_in_range(
        &self,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize>;
}
