//! Repository trait for derived Operations.

use async_trait::async_trait;

use super::Operation;
use crate::errors::Result;

/// Operations are derived data: they are deleted and regenerated wholesale
/// for the affected instruments whenever movement history changes.
#[async_trait]
pub trait OperationRepositoryTrait: Send + Sync {
    /// Atomically replaces all operations for the given instruments of one
    /// account. Returns the number of operations written.
    async fn replace_for_instruments(
        &self,
        account_id: &str,
        instrument_ids: &[String],
        operations: &[Operation],
    ) -> Result<usize>;

    /// All operations for the account, open first, then by open date.
    fn get_for_account(&self, account_id: &str) -> Result<Vec<Operation>>;
}
