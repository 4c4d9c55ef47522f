//! A [`Database`] wrapper adding timeouts and statement logging.

use std::future::Future;
use std::time::Instant;

use tracing::Level;

use crate::client::Database;
use crate::config::DbConfig;
use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::value::{Record, Value};

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! event_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN => tracing::warn!($($field)*),
            Level::INFO => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

/// Wraps a handle and applies a [`DbConfig`] to every statement.
///
/// ```ignore
/// let db = InstrumentedDb::new(client).with_config(
///     DbConfig::new()
///         .with_query_timeout(Duration::from_secs(5))
///         .with_slow_query_threshold(Duration::from_millis(200)),
/// );
/// select([&u.user_id]).from(&u).fetch_all(&db, |row| row.int64(&u.user_id)).await?;
/// ```
pub struct InstrumentedDb<D> {
    inner: D,
    config: DbConfig,
}

impl<D: Database> InstrumentedDb<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            config: DbConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DbConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn log_statement(&self, sql: &str, args: &[Value]) {
        let sql = self.config.truncate_sql(sql);
        let dialect = self.inner.dialect();
        if self.config.log_params {
            event_at_level!(
                self.config.log_level,
                target: "sqkit::sql",
                %dialect,
                sql = %sql,
                params = ?args,
                "sql"
            );
        } else {
            event_at_level!(
                self.config.log_level,
                target: "sqkit::sql",
                %dialect,
                sql = %sql,
                param_count = args.len(),
                "sql"
            );
        }
    }

    async fn run<T, F>(&self, sql: &str, future: F) -> SqResult<T>
    where
        F: Future<Output = SqResult<T>> + Send,
    {
        let start = Instant::now();
        let result = match self.config.query_timeout {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .unwrap_or(Err(SqError::Timeout(limit))),
            None => future.await,
        };
        let elapsed = start.elapsed();

        if let Some(threshold) = self.config.slow_query_threshold
            && elapsed > threshold
        {
            tracing::warn!(
                target: "sqkit::sql",
                duration_ms = elapsed.as_millis() as u64,
                threshold_ms = threshold.as_millis() as u64,
                sql = %self.config.truncate_sql(sql),
                "slow query"
            );
        }
        if let Err(e) = &result {
            tracing::debug!(target: "sqkit::sql", error = %e, "statement failed");
        }
        result
    }
}

impl<D: Database> Database for InstrumentedDb<D> {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn query(&self, sql: &str, args: &[Value]) -> SqResult<Vec<Record>> {
        self.log_statement(sql, args);
        self.run(sql, self.inner.query(sql, args)).await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> SqResult<u64> {
        self.log_statement(sql, args);
        self.run(sql, self.inner.execute(sql, args)).await
    }

    async fn insert_returning_id(&self, sql: &str, args: &[Value]) -> SqResult<Option<i64>> {
        self.log_statement(sql, args);
        self.run(sql, self.inner.insert_returning_id(sql, args))
            .await
    }
}
