//! Database handle trait.
//!
//! Statements are executed through any [`Database`]: a `tokio_postgres`
//! client, a transaction, an [`InstrumentedDb`](crate::InstrumentedDb)
//! wrapper or a test double. The handle owns pooling, retries and timeouts;
//! this crate only renders and forwards.

use std::future::Future;

use tokio_postgres::types::ToSql;

use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::value::{Record, Value, record_from_pg_row};

/// A handle that can run parameterized statements.
pub trait Database: Send + Sync {
    /// Dialect statements are rendered for.
    fn dialect(&self) -> Dialect;

    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = SqResult<Vec<Record>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, args: &[Value]) -> impl Future<Output = SqResult<u64>> + Send;

    /// Execute an insert and return the generated row id.
    ///
    /// The default implementation reads the first column of the first
    /// returned row, which suits `INSERT ... RETURNING id`. Backends with a
    /// native last-insert-id should override it.
    fn insert_returning_id(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = SqResult<Option<i64>>> + Send {
        async move {
            let rows = self.query(sql, args).await?;
            match rows.first().and_then(|row| row.first()) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Int(id)) => Ok(Some(*id)),
                Some(other) => Err(SqError::decode(
                    "RETURNING",
                    format!("expected an integer id, got {}", other.type_name()),
                )),
            }
        }
    }
}

/// Parameter refs compatible with `tokio-postgres`.
pub(crate) fn params_ref(args: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

impl Database for tokio_postgres::Client {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&self, sql: &str, args: &[Value]) -> SqResult<Vec<Record>> {
        let params = params_ref(args);
        let rows = tokio_postgres::Client::query(self, sql, &params)
            .await
            .map_err(SqError::from_db_error)?;
        rows.iter().map(record_from_pg_row).collect()
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> SqResult<u64> {
        let params = params_ref(args);
        tokio_postgres::Client::execute(self, sql, &params)
            .await
            .map_err(SqError::from_db_error)
    }
}

impl Database for tokio_postgres::Transaction<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&self, sql: &str, args: &[Value]) -> SqResult<Vec<Record>> {
        let params = params_ref(args);
        let rows = tokio_postgres::Transaction::query(self, sql, &params)
            .await
            .map_err(SqError::from_db_error)?;
        rows.iter().map(record_from_pg_row).collect()
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> SqResult<u64> {
        let params = params_ref(args);
        tokio_postgres::Transaction::execute(self, sql, &params)
            .await
            .map_err(SqError::from_db_error)
    }
}
