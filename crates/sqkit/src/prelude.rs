//! Convenient imports for typical `sqkit` usage.
//!
//! ```ignore
//! use sqkit::prelude::*;
//! ```

pub use crate::{
    Accumulator, Cte, Database, Dialect, ExecMode, Field, FieldType, IntoField, Predicate, Row,
    SqError, SqResult, SqlStatement, TableInfo, Value, and, assign, count_star, delete_from,
    exists, insert_into, not, not_exists, or, select, select_distinct, update,
};
