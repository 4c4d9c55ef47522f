//! Table sources for `FROM` and `JOIN`.

use crate::cte::{Cte, RecursiveCte};
use crate::error::SqResult;
use crate::field::{Field, TableInfo};
use crate::query::{Query, SelectQuery, SqlStatement};
use crate::render::Renderer;

/// Anything a query can read rows from.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    /// A physical table from the catalog.
    Table(TableInfo),
    /// A parenthesized subquery with an alias.
    Subquery(Subquery),
    /// A reference to a CTE declared in the statement's `WITH` list.
    Cte(CteRef),
}

impl TableSource {
    /// Prefix used by columns read from this source.
    pub fn qualifier(&self) -> &str {
        match self {
            TableSource::Table(t) => t.qualifier(),
            TableSource::Subquery(s) => &s.alias,
            TableSource::Cte(c) => c.alias.as_deref().unwrap_or(&c.name),
        }
    }

    /// Name used to identify the statement in errors.
    pub(crate) fn display_name(&self) -> &str {
        match self {
            TableSource::Table(t) => &t.name,
            TableSource::Subquery(s) => &s.alias,
            TableSource::Cte(c) => &c.name,
        }
    }

    /// Write `name [AS alias]` or `(subquery) AS alias`.
    pub(crate) fn append_sql(&self, r: &mut Renderer) -> SqResult<()> {
        match self {
            TableSource::Table(t) => t.append_sql(r),
            TableSource::Subquery(s) => {
                r.push_char('(');
                s.query.append_sql(r)?;
                r.push(") AS ").push_ident(&s.alias)?;
                Ok(())
            }
            TableSource::Cte(c) => {
                r.push_ident(&c.name)?;
                if let Some(alias) = &c.alias {
                    r.push(" AS ").push_ident(alias)?;
                }
                Ok(())
            }
        }
    }
}

impl From<TableInfo> for TableSource {
    fn from(t: TableInfo) -> Self {
        TableSource::Table(t)
    }
}

impl From<&TableInfo> for TableSource {
    fn from(t: &TableInfo) -> Self {
        TableSource::Table(t.clone())
    }
}

impl From<Subquery> for TableSource {
    fn from(s: Subquery) -> Self {
        TableSource::Subquery(s)
    }
}

impl From<&Subquery> for TableSource {
    fn from(s: &Subquery) -> Self {
        TableSource::Subquery(s.clone())
    }
}

impl From<&Cte> for TableSource {
    fn from(c: &Cte) -> Self {
        TableSource::Cte(CteRef {
            name: c.name().to_string(),
            alias: c.alias_name().map(str::to_string),
        })
    }
}

impl From<&RecursiveCte> for TableSource {
    fn from(c: &RecursiveCte) -> Self {
        TableSource::from(c.as_cte())
    }
}

/// A derived table: `(SELECT ...) AS alias`.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    pub(crate) query: Box<Query>,
    pub(crate) alias: String,
}

impl Subquery {
    pub fn new(query: impl Into<Query>, alias: impl Into<String>) -> Self {
        Self {
            query: Box::new(query.into()),
            alias: alias.into(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Reference an output column of the subquery. Aliased projections are
    /// referenced under their alias.
    pub fn field(&self, projected: &Field) -> Field {
        Field::qualified(&self.alias, projected.output_name())
    }

    /// Reference an output column by name.
    pub fn col(&self, name: impl Into<String>) -> Field {
        Field::qualified(&self.alias, name)
    }
}

impl SelectQuery {
    /// Wrap this query as a derived table.
    pub fn subquery(self, alias: impl Into<String>) -> Subquery {
        Subquery::new(self, alias)
    }
}

/// Reference to a CTE by name and optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct CteRef {
    pub name: String,
    pub alias: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::field::FieldType;
    use crate::query::select;

    #[test]
    fn physical_table_with_schema_and_alias() {
        let t = TableInfo::new("users").with_schema("app").with_alias("u");
        let mut r = Renderer::new(Dialect::Postgres);
        TableSource::from(&t).append_sql(&mut r).unwrap();
        assert_eq!(r.sql(), "app.users AS u");
    }

    #[test]
    fn subquery_is_parenthesized_and_aliased() {
        let t = TableInfo::new("orders");
        let total = Field::new(&t, "total", FieldType::Number);
        let sq = select([total.alias("amount")])
            .from(&t)
            .where_([total.gt(100)])
            .subquery("big");
        let mut r = Renderer::new(Dialect::Postgres);
        TableSource::from(&sq).append_sql(&mut r).unwrap();
        let built = r.finish();
        assert_eq!(
            built.sql,
            "(SELECT orders.total AS amount FROM orders WHERE orders.total > $1) AS big"
        );
        assert_eq!(sq.field(&total.alias("amount")).to_string(), "big.amount");
        assert_eq!(sq.field(&total).to_string(), "big.total");
    }
}
