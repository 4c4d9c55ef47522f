//! Common table expressions (`WITH` clauses).
//!
//! [`Cte`] binds a query to a name. [`RecursiveCte`] is a separate builder
//! that additionally takes an anchor query ([`RecursiveCte::initial`]) and a
//! recursive branch ([`RecursiveCte::union`] / [`RecursiveCte::union_all`]).
//! Plain CTEs do not have those methods at all:
//!
//! ```compile_fail
//! use sqkit::{Cte, Field, select};
//!
//! let cte = Cte::new("cte1", select([Field::raw("1")])).initial(select([Field::raw("2")]));
//! ```
//!
//! When any CTE of a statement is recursive the list renders as
//! `WITH RECURSIVE` once, never per CTE.
//!
//! # Example
//! ```ignore
//! use sqkit::{Cte, Field, Predicate, select};
//!
//! let tens = Cte::recursive("tens", ["n"]);
//! let n = tens.field("n");
//! let step = select([&n])
//!     .from(&tens)
//!     .where_([Predicate::expr("? + 10 <= 100", [&n])]);
//! let tens = tens.initial(select([Field::raw("10")])).union_all(step);
//! let q = select([&n]).with([tens.clone()]).from(&tens);
//! ```

use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::field::Field;
use crate::query::{Query, SqlStatement};
use crate::render::Renderer;

/// How the recursive branch joins the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionKind {
    Union,
    UnionAll,
}

impl UnionKind {
    fn keyword(self) -> &'static str {
        match self {
            UnionKind::Union => " UNION ",
            UnionKind::UnionAll => " UNION ALL ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CteBody {
    Plain(Option<Box<Query>>),
    Recursive {
        initial: Option<Box<Query>>,
        step: Option<(UnionKind, Box<Query>)>,
    },
}

/// A named query binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    name: String,
    alias: Option<String>,
    columns: Vec<String>,
    body: CteBody,
    materialized: Option<bool>,
}

impl Cte {
    /// Bind `query` to `name`.
    pub fn new(name: impl Into<String>, query: impl Into<Query>) -> Self {
        Self::with_body(name, CteBody::Plain(Some(Box::new(query.into()))))
    }

    /// A CTE with no query; its body renders as `(NULL)`.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::with_body(name, CteBody::Plain(None))
    }

    /// Start a recursive CTE.
    pub fn recursive<I>(name: impl Into<String>, columns: I) -> RecursiveCte
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        RecursiveCte(
            Self::with_body(
                name,
                CteBody::Recursive {
                    initial: None,
                    step: None,
                },
            )
            .columns(columns),
        )
    }

    fn with_body(name: impl Into<String>, body: CteBody) -> Self {
        Self {
            name: name.into(),
            alias: None,
            columns: Vec::new(),
            body,
            materialized: None,
        }
    }

    /// Reference this CTE under `alias`. Empty clears it.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        self.alias = (!alias.is_empty()).then_some(alias);
        self
    }

    /// Explicit output column names.
    pub fn columns<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// `AS MATERIALIZED` (postgres only, ignored elsewhere).
    pub fn materialized(mut self) -> Self {
        self.materialized = Some(true);
        self
    }

    /// `AS NOT MATERIALIZED` (postgres only, ignored elsewhere).
    pub fn not_materialized(mut self) -> Self {
        self.materialized = Some(false);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn is_recursive(&self) -> bool {
        matches!(self.body, CteBody::Recursive { .. })
    }

    /// Qualifier used by fields of this CTE: the alias, else the name.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Reference one output column of this CTE.
    pub fn field(&self, column: impl Into<String>) -> Field {
        Field::qualified(self.qualifier(), column)
    }

    fn node(&self) -> String {
        if self.is_recursive() {
            format!("recursive CTE `{}`", self.name)
        } else {
            format!("CTE `{}`", self.name)
        }
    }

    fn check_columns(&self, query: &Query, branch: &str) -> SqResult<()> {
        if self.columns.is_empty() {
            return Ok(());
        }
        match query.projection_len() {
            Some(n) if n != self.columns.len() => Err(SqError::render(
                self.node(),
                format!(
                    "declares {} column(s) but its {branch} projects {n}",
                    self.columns.len()
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Write `name (cols) AS (body)`.
    fn append_definition_sql(&self, r: &mut Renderer) -> SqResult<()> {
        r.push_ident(&self.name)?;
        if !self.columns.is_empty() {
            r.push(" (");
            for (i, column) in self.columns.iter().enumerate() {
                if i > 0 {
                    r.push(", ");
                }
                r.push_ident(column)?;
            }
            r.push_char(')');
        }
        r.push(" AS ");
        if r.dialect() == Dialect::Postgres {
            match self.materialized {
                Some(true) => {
                    r.push("MATERIALIZED ");
                }
                Some(false) => {
                    r.push("NOT MATERIALIZED ");
                }
                None => {}
            }
        }
        r.push_char('(');
        match &self.body {
            CteBody::Plain(None) => {
                r.push("NULL");
            }
            CteBody::Plain(Some(query)) => {
                self.check_columns(query, "query")?;
                query.append_sql(r)?;
            }
            CteBody::Recursive { initial, step } => {
                let Some(initial) = initial else {
                    return Err(SqError::render(self.node(), "has no initial query"));
                };
                let Some((kind, step)) = step else {
                    return Err(SqError::render(
                        self.node(),
                        "initial query set but neither union nor union_all was called",
                    ));
                };
                self.check_columns(initial, "initial query")?;
                self.check_columns(step, "recursive query")?;
                initial.append_sql(r)?;
                r.push(kind.keyword());
                step.append_sql(r)?;
            }
        }
        r.push_char(')');
        Ok(())
    }
}

impl From<RecursiveCte> for Cte {
    fn from(c: RecursiveCte) -> Self {
        c.0
    }
}

/// Builder for a recursive CTE.
#[derive(Debug, Clone, PartialEq)]
pub struct RecursiveCte(Cte);

impl RecursiveCte {
    /// Set the anchor query.
    pub fn initial(mut self, query: impl Into<Query>) -> Self {
        if let CteBody::Recursive { initial, .. } = &mut self.0.body {
            *initial = Some(Box::new(query.into()));
        }
        self
    }

    /// Combine the anchor with `query` using `UNION`. The last call wins.
    pub fn union(self, query: impl Into<Query>) -> Self {
        self.step(UnionKind::Union, query.into())
    }

    /// Combine the anchor with `query` using `UNION ALL`. The last call wins.
    pub fn union_all(self, query: impl Into<Query>) -> Self {
        self.step(UnionKind::UnionAll, query.into())
    }

    fn step(mut self, kind: UnionKind, query: Query) -> Self {
        if let CteBody::Recursive { step, .. } = &mut self.0.body {
            *step = Some((kind, Box::new(query)));
        }
        self
    }

    pub fn alias(self, alias: impl Into<String>) -> Self {
        Self(self.0.alias(alias))
    }

    pub fn materialized(self) -> Self {
        Self(self.0.materialized())
    }

    pub fn not_materialized(self) -> Self {
        Self(self.0.not_materialized())
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn field(&self, column: impl Into<String>) -> Field {
        self.0.field(column)
    }

    pub fn as_cte(&self) -> &Cte {
        &self.0
    }
}

/// Write the `WITH [RECURSIVE] ...` clause followed by a space, or nothing
/// for an empty list.
pub(crate) fn append_with_sql(ctes: &[Cte], r: &mut Renderer) -> SqResult<()> {
    if ctes.is_empty() {
        return Ok(());
    }
    r.push("WITH ");
    if ctes.iter().any(Cte::is_recursive) {
        r.push("RECURSIVE ");
    }
    for (i, cte) in ctes.iter().enumerate() {
        if i > 0 {
            r.push(", ");
        }
        cte.append_definition_sql(r)?;
    }
    r.push_char(' ');
    Ok(())
}
