//! # sqkit
//!
//! A composable SQL query tree with dialect-aware, parameterized rendering and
//! a row cursor that reads columns by field descriptor.
//!
//! ## Features
//!
//! - **Values, not strings**: fields, predicates, joins, CTEs and statements
//!   are immutable values combined by consuming builders
//! - **Per-call rendering**: argument lists and placeholder numbering live in a
//!   short-lived [`Renderer`], so one tree can be rendered from many threads
//! - **Dialects**: `?` placeholders for sqlite/mysql, `$n` for postgres, and
//!   dialect-specific upsert phrasing
//! - **Render-time validation**: malformed trees (an un-anchored recursive CTE,
//!   an empty static `IN` list, mismatched column lists) fail with an error
//!   naming the offending node
//! - **Safe defaults**: DELETE requires WHERE, UPDATE requires SET
//! - **Grouping cursor**: rebuild one-to-many results from join rows with
//!   [`Accumulator`]
//!
//! ## Quick start
//!
//! ```ignore
//! use sqkit::prelude::*;
//!
//! sqkit::table! {
//!     pub struct Users("users") {
//!         user_id: Number,
//!         displayname: String,
//!         active: Boolean,
//!     }
//! }
//!
//! let u = Users::new("u");
//! let active = select([&u.user_id, &u.displayname])
//!     .from(&u)
//!     .where_([u.active.eq(true)])
//!     .order_by([&u.user_id])
//!     .fetch_all(&client, |row| Ok((row.int64(&u.user_id)?, row.string(&u.displayname)?)))
//!     .await?;
//! ```

pub mod accumulate;
pub mod assignment;
pub mod catalog;
pub mod client;
pub mod config;
pub mod cte;
pub mod dialect;
pub mod error;
pub mod field;
pub mod ident;
pub mod instrumented;
pub mod join;
pub mod predicate;
pub mod prelude;
pub mod query;
pub mod render;
pub mod row;
pub mod table;
pub mod value;

pub use accumulate::Accumulator;
pub use assignment::{Assignment, Assignments, ColumnSetter, assign};
pub use client::Database;
pub use config::DbConfig;
pub use cte::{Cte, RecursiveCte, UnionKind};
pub use dialect::Dialect;
pub use error::{SqError, SqResult};
pub use field::{Field, FieldType, IntoField, NullsOrder, SortDir, TableInfo, count_star};
pub use instrumented::InstrumentedDb;
pub use join::{JoinTable, JoinType, custom_join, full_join, join, left_join, right_join};
pub use predicate::{
    CmpOp, InSource, LogicalOp, Predicate, VariadicPredicate, and, exists, not, not_exists, or,
};
pub use query::{
    DeleteQuery, ExecMode, ExecResult, InsertQuery, OnConflictBuilder, Query, SelectQuery,
    SqlStatement, StatementId, StatementKind, UpdateQuery, delete_from, insert_into, select,
    select_distinct, update,
};
pub use render::{BuiltQuery, Renderer};
pub use row::{FromValue, Row};
pub use table::{CteRef, Subquery, TableSource};
pub use value::{Record, Value};
