//! Statement builders and their execution.
//!
//! Every builder is a plain value: combinators consume `self` and return the
//! extended builder, and a finished tree can be cloned, rendered any number of
//! times and shared between threads.
//!
//! # Usage
//!
//! ```ignore
//! use sqkit::{ExecMode, assign, delete_from, insert_into, select, update};
//!
//! let u = Users::new("u");
//!
//! // SELECT
//! let names = select([&u.user_id, &u.displayname])
//!     .from(&u)
//!     .where_([u.active.eq(true)])
//!     .order_by([u.user_id.desc()])
//!     .limit(20)
//!     .fetch_all(&db, |row| Ok((row.int64(&u.user_id)?, row.string(&u.displayname)?)))
//!     .await?;
//!
//! // INSERT
//! insert_into(&u)
//!     .valuesx(|col| {
//!         col.set_string(&u.displayname, "alice");
//!         col.set_string(&u.email, "alice@example.com");
//!     })
//!     .exec(&db, ExecMode::RowsAffected)
//!     .await?;
//!
//! // UPDATE
//! update(&u)
//!     .set([assign(&u.active, false)])
//!     .where_([u.user_id.eq(user_id)])
//!     .exec(&db, ExecMode::NoResult)
//!     .await?;
//!
//! // DELETE
//! delete_from(&u)
//!     .where_([u.user_id.eq(user_id)])
//!     .exec(&db, ExecMode::RowsAffected)
//!     .await?;
//! ```

mod delete;
mod exec;
mod insert;
mod select;
mod update;

use std::fmt;

pub use delete::DeleteQuery;
pub use exec::{ExecMode, ExecResult};
pub use insert::{InsertQuery, OnConflictBuilder};
pub use select::SelectQuery;
pub use update::UpdateQuery;

use crate::dialect::Dialect;
use crate::error::SqResult;
use crate::field::{Field, IntoField, TableInfo};
use crate::render::{BuiltQuery, Renderer};

/// Statement class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
        })
    }
}

/// Structural identity of a statement: its kind and primary table.
///
/// Used in execution errors and logs in place of the SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementId {
    pub kind: StatementKind,
    pub table: Option<String>,
}

impl StatementId {
    pub fn new(kind: StatementKind, table: Option<&str>) -> Self {
        Self {
            kind,
            table: table.filter(|t| !t.is_empty()).map(str::to_string),
        }
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{} {}", self.kind, table),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// A renderable statement.
pub trait SqlStatement {
    /// Write the statement into `r`.
    fn append_sql(&self, r: &mut Renderer) -> SqResult<()>;

    fn statement_id(&self) -> StatementId;

    /// Whether executing the statement yields rows.
    fn returns_rows(&self) -> bool;

    /// Number of output columns when statically known.
    fn projection_len(&self) -> Option<usize>;

    /// Render for `dialect` with fresh scratch state.
    fn build(&self, dialect: Dialect) -> SqResult<BuiltQuery> {
        let mut r = Renderer::new(dialect);
        self.append_sql(&mut r)?;
        Ok(r.finish())
    }

    /// Debug helper returning only the SQL text.
    fn to_sql(&self, dialect: Dialect) -> SqResult<String> {
        self.build(dialect).map(|b| b.sql)
    }
}

/// Any statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(SelectQuery),
    Insert(InsertQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
}

impl SqlStatement for Query {
    fn append_sql(&self, r: &mut Renderer) -> SqResult<()> {
        match self {
            Query::Select(q) => q.append_sql(r),
            Query::Insert(q) => q.append_sql(r),
            Query::Update(q) => q.append_sql(r),
            Query::Delete(q) => q.append_sql(r),
        }
    }

    fn statement_id(&self) -> StatementId {
        match self {
            Query::Select(q) => q.statement_id(),
            Query::Insert(q) => q.statement_id(),
            Query::Update(q) => q.statement_id(),
            Query::Delete(q) => q.statement_id(),
        }
    }

    fn returns_rows(&self) -> bool {
        match self {
            Query::Select(q) => q.returns_rows(),
            Query::Insert(q) => q.returns_rows(),
            Query::Update(q) => q.returns_rows(),
            Query::Delete(q) => q.returns_rows(),
        }
    }

    fn projection_len(&self) -> Option<usize> {
        match self {
            Query::Select(q) => q.projection_len(),
            Query::Insert(q) => q.projection_len(),
            Query::Update(q) => q.projection_len(),
            Query::Delete(q) => q.projection_len(),
        }
    }
}

impl From<SelectQuery> for Query {
    fn from(q: SelectQuery) -> Self {
        Query::Select(q)
    }
}

impl From<InsertQuery> for Query {
    fn from(q: InsertQuery) -> Self {
        Query::Insert(q)
    }
}

impl From<UpdateQuery> for Query {
    fn from(q: UpdateQuery) -> Self {
        Query::Update(q)
    }
}

impl From<DeleteQuery> for Query {
    fn from(q: DeleteQuery) -> Self {
        Query::Delete(q)
    }
}

impl IntoField for SelectQuery {
    fn into_field(self) -> Field {
        Field::subquery(self)
    }
}

/// Write `fields` comma-separated, projection style.
pub(crate) fn append_fields_sql(
    fields: &[Field],
    r: &mut Renderer,
    excluded: &[&str],
) -> SqResult<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            r.push(", ");
        }
        field.append_select_sql(r, excluded)?;
    }
    Ok(())
}

fn collect_fields<I>(fields: I) -> Vec<Field>
where
    I: IntoIterator,
    I::Item: IntoField,
{
    fields.into_iter().map(IntoField::into_field).collect()
}

/// `SELECT fields`
///
/// An empty field list is filled from the row mapper at execution time.
pub fn select<I>(fields: I) -> SelectQuery
where
    I: IntoIterator,
    I::Item: IntoField,
{
    SelectQuery::new(collect_fields(fields))
}

/// `SELECT DISTINCT fields`
pub fn select_distinct<I>(fields: I) -> SelectQuery
where
    I: IntoIterator,
    I::Item: IntoField,
{
    SelectQuery::new(collect_fields(fields)).distinct()
}

/// `INSERT INTO table`
pub fn insert_into(table: impl Into<TableInfo>) -> InsertQuery {
    InsertQuery::new(table.into())
}

/// `UPDATE table`
pub fn update(table: impl Into<TableInfo>) -> UpdateQuery {
    UpdateQuery::new(table.into())
}

/// `DELETE FROM table`
///
/// # Safety
/// A DELETE without WHERE conditions fails to render unless
/// [`DeleteQuery::allow_delete_all`] was set.
pub fn delete_from(table: impl Into<TableInfo>) -> DeleteQuery {
    DeleteQuery::new(table.into())
}
