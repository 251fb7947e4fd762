//! SQLite repository for derived operations.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::sync::Arc;

use tradelens_core::operations::{Operation, OperationRepositoryTrait};
use tradelens_core::Result;

use super::model::OperationDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::operations;

pub struct OperationRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl OperationRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl OperationRepositoryTrait for OperationRepository {
    async fn replace_for_instruments(
        &self,
        account_id: &str,
        instrument_ids: &[String],
        to_save: &[Operation],
    ) -> Result<usize> {
        let account_owned = account_id.to_string();
        let instruments_owned = instrument_ids.to_vec();
        let db_models: Vec<OperationDB> = to_save.iter().cloned().map(OperationDB::from).collect();

        // Delete and insert in one transaction: operations are derived data
        // and a half-replaced set would be worse than none.
        self.writer
            .exec(move |conn| {
                diesel::delete(
                    operations::table
                        .filter(operations::account_id.eq(&account_owned))
                        .filter(operations::instrument_id.eq_any(&instruments_owned)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;

                let written = diesel::insert_into(operations::table)
                    .values(&db_models)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                debug!(
                    "Replaced operations for account {}: {} written",
                    account_owned, written
                );
                Ok(written)
            })
            .await
    }

    fn get_for_account(&self, account_id: &str) -> Result<Vec<Operation>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = operations::table
            .filter(operations::account_id.eq(account_id))
            .order((operations::is_open.desc(), operations::open_date.asc()))
            .select(OperationDB::as_select())
            .load::<OperationDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(Operation::from).collect())
    }
}
