//! Execution entry points.
//!
//! Every entry point renders the statement for the handle's dialect, emits one
//! `debug` event on target `sqkit::exec` and forwards to the [`Database`].
//! Database failures come back wrapped in [`SqError::Execute`] together with the
//! statement identity and the caller's source location.

use std::borrow::Cow;
use std::future::Future;
use std::panic::Location;

use crate::client::Database;
use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::field::Field;
use crate::query::{
    DeleteQuery, InsertQuery, Query, SelectQuery, SqlStatement, StatementId, UpdateQuery,
};
use crate::render::{BuiltQuery, Renderer};
use crate::row::Row;
use crate::value::{Record, Value};

type Site = &'static Location<'static>;

/// What a write statement should report back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Run the statement and discard the outcome.
    #[default]
    NoResult,
    /// Report the number of affected rows.
    RowsAffected,
    /// Report the generated row id.
    ///
    /// On postgres the statement must carry a `RETURNING` clause whose first
    /// column is the id.
    LastInsertId,
}

/// Outcome of [`exec`](InsertQuery::exec). Only the part requested by the
/// [`ExecMode`] is filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    pub rows_affected: Option<u64>,
    pub last_insert_id: Option<i64>,
}

/// Statements whose output columns are an explicit field list.
pub(crate) trait Projected: SqlStatement + Clone {
    fn projection(&self) -> &[Field];

    fn set_projection(&mut self, fields: Vec<Field>);
}

impl Projected for SelectQuery {
    fn projection(&self) -> &[Field] {
        &self.fields
    }

    fn set_projection(&mut self, fields: Vec<Field>) {
        self.fields = fields;
    }
}

macro_rules! impl_projected_returning {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Projected for $ty {
                fn projection(&self) -> &[Field] {
                    &self.returning
                }

                fn set_projection(&mut self, fields: Vec<Field>) {
                    self.returning = fields;
                }
            }
        )*
    };
}

impl_projected_returning!(InsertQuery, UpdateQuery, DeleteQuery);

fn trace_statement(id: &StatementId, dialect: Dialect, built: &BuiltQuery) {
    tracing::debug!(
        target: "sqkit::exec",
        statement = %id,
        dialect = %dialect,
        param_count = built.args.len(),
        sql = %built.sql,
        "executing statement"
    );
}

async fn query_records<D: Database>(
    db: &D,
    id: &StatementId,
    built: &BuiltQuery,
    site: Site,
) -> SqResult<Vec<Record>> {
    trace_statement(id, db.dialect(), built);
    db.query(&built.sql, &built.args)
        .await
        .map_err(|e| SqError::execute(id.clone(), site, e))
}

/// Fill an empty projection by running the mapper once in registration mode.
fn registered<'s, S, T, F>(stmt: &'s S, f: &mut F) -> SqResult<Cow<'s, S>>
where
    S: Projected,
    F: FnMut(&mut Row<'_>) -> SqResult<T>,
{
    if !stmt.projection().is_empty() {
        return Ok(Cow::Borrowed(stmt));
    }
    let mut fields = Vec::new();
    {
        let mut row = Row::register(&mut fields);
        f(&mut row)?;
    }
    if fields.is_empty() {
        return Err(SqError::render(
            stmt.statement_id().to_string(),
            "no fields to project and the row mapper read none",
        ));
    }
    let mut owned = stmt.clone();
    owned.set_projection(fields);
    Ok(Cow::Owned(owned))
}

async fn fetch_mapped<S, D, T, F>(
    stmt: &S,
    db: &D,
    site: Site,
    mut f: F,
    limit: Option<usize>,
) -> SqResult<Vec<T>>
where
    S: Projected,
    D: Database,
    F: FnMut(&mut Row<'_>) -> SqResult<T>,
{
    let stmt = registered(stmt, &mut f)?;
    let id = stmt.statement_id();
    let built = stmt.build(db.dialect())?;
    let records = query_records(db, &id, &built, site).await?;

    let columns = stmt.projection();
    let take = limit.unwrap_or(records.len()).min(records.len());
    let mut out = Vec::with_capacity(take);
    for record in records.iter().take(take) {
        let mut row = Row::read(columns, record);
        out.push(f(&mut row)?);
    }
    Ok(out)
}

async fn exec_statement<S, D>(stmt: &S, db: &D, mode: ExecMode, site: Site) -> SqResult<ExecResult>
where
    S: SqlStatement + ?Sized,
    D: Database,
{
    let id = stmt.statement_id();
    let dialect = db.dialect();
    if mode == ExecMode::LastInsertId && dialect == Dialect::Postgres && !stmt.returns_rows() {
        return Err(SqError::validation(format!(
            "{id}: reading the generated id on {dialect} requires a RETURNING clause"
        )));
    }
    let built = stmt.build(dialect)?;
    trace_statement(&id, dialect, &built);
    let wrap = |e: SqError| SqError::execute(id.clone(), site, e);

    match mode {
        ExecMode::NoResult => {
            db.execute(&built.sql, &built.args).await.map_err(wrap)?;
            Ok(ExecResult::default())
        }
        ExecMode::RowsAffected => {
            let n = db.execute(&built.sql, &built.args).await.map_err(wrap)?;
            Ok(ExecResult {
                rows_affected: Some(n),
                ..ExecResult::default()
            })
        }
        ExecMode::LastInsertId => {
            let last = db
                .insert_returning_id(&built.sql, &built.args)
                .await
                .map_err(wrap)?;
            Ok(ExecResult {
                last_insert_id: last,
                ..ExecResult::default()
            })
        }
    }
}

macro_rules! impl_fetch {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $ty {
                /// Run the statement and call `f` once per returned row.
                ///
                /// When no output fields were given, `f` is first called once in
                /// registration mode and the fields it reads become the
                /// projection. Returns the number of rows seen.
                #[track_caller]
                pub fn fetch_each<D, F>(
                    &self,
                    db: &D,
                    f: F,
                ) -> impl Future<Output = SqResult<u64>>
                where
                    D: Database,
                    F: FnMut(&mut Row<'_>) -> SqResult<()>,
                {
                    let site = Location::caller();
                    async move {
                        let rows = fetch_mapped(self, db, site, f, None).await?;
                        Ok(rows.len() as u64)
                    }
                }

                /// Run the statement and map every row with `f`.
                #[track_caller]
                pub fn fetch_all<D, T, F>(
                    &self,
                    db: &D,
                    f: F,
                ) -> impl Future<Output = SqResult<Vec<T>>>
                where
                    D: Database,
                    F: FnMut(&mut Row<'_>) -> SqResult<T>,
                {
                    let site = Location::caller();
                    async move { fetch_mapped(self, db, site, f, None).await }
                }

                /// Run the statement and map the first row; no row is
                /// [`SqError::NotFound`].
                #[track_caller]
                pub fn fetch_one<D, T, F>(
                    &self,
                    db: &D,
                    f: F,
                ) -> impl Future<Output = SqResult<T>>
                where
                    D: Database,
                    F: FnMut(&mut Row<'_>) -> SqResult<T>,
                {
                    let site = Location::caller();
                    async move {
                        fetch_mapped(self, db, site, f, Some(1))
                            .await?
                            .pop()
                            .ok_or_else(|| {
                                SqError::not_found(format!(
                                    "{} returned no rows",
                                    self.statement_id()
                                ))
                            })
                    }
                }

                /// Run the statement and map the first row, if any.
                #[track_caller]
                pub fn fetch_opt<D, T, F>(
                    &self,
                    db: &D,
                    f: F,
                ) -> impl Future<Output = SqResult<Option<T>>>
                where
                    D: Database,
                    F: FnMut(&mut Row<'_>) -> SqResult<T>,
                {
                    let site = Location::caller();
                    async move { Ok(fetch_mapped(self, db, site, f, Some(1)).await?.pop()) }
                }
            }
        )*
    };
}

impl_fetch!(SelectQuery, InsertQuery, UpdateQuery, DeleteQuery);

macro_rules! impl_exec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $ty {
                /// Run the statement, reporting what `mode` asks for.
                #[track_caller]
                pub fn exec<D: Database>(
                    &self,
                    db: &D,
                    mode: ExecMode,
                ) -> impl Future<Output = SqResult<ExecResult>> {
                    let site = Location::caller();
                    async move { exec_statement(self, db, mode, site).await }
                }
            }
        )*
    };
}

impl_exec!(InsertQuery, UpdateQuery, DeleteQuery, Query);

impl SelectQuery {
    /// `SELECT EXISTS (<query>)`.
    ///
    /// A query without fields selects the constant `1`.
    #[track_caller]
    pub fn exists<D: Database>(&self, db: &D) -> impl Future<Output = SqResult<bool>> {
        let site = Location::caller();
        async move {
            let inner = if self.fields.is_empty() {
                Cow::Owned(self.clone().fields([Field::raw("1")]))
            } else {
                Cow::Borrowed(self)
            };
            let id = self.statement_id();
            let mut r = Renderer::new(db.dialect());
            r.push("SELECT EXISTS (");
            inner.append_sql(&mut r)?;
            r.push_char(')');
            let built = r.finish();

            let records = query_records(db, &id, &built, site).await?;
            match records.first().and_then(|record| record.first()) {
                Some(Value::Bool(b)) => Ok(*b),
                Some(Value::Int(n)) => Ok(*n != 0),
                Some(other) => Err(SqError::decode(
                    "EXISTS",
                    format!("expected a boolean, got {}", other.type_name()),
                )),
                None => Err(SqError::decode("EXISTS", "no row returned")),
            }
        }
    }
}
