//! SELECT builder.

use crate::cte::{Cte, append_with_sql};
use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::field::{Field, FieldKind, IntoField};
use crate::join::{JoinTable, JoinType, append_joins_sql};
use crate::predicate::{Predicate, VariadicPredicate};
use crate::query::{SqlStatement, StatementId, StatementKind, append_fields_sql};
use crate::render::Renderer;
use crate::table::TableSource;

/// SELECT statement builder.
#[derive(Debug, Clone, PartialEq, Default)]
#[must_use]
pub struct SelectQuery {
    pub(crate) ctes: Vec<Cte>,
    pub(crate) distinct: bool,
    pub(crate) fields: Vec<Field>,
    pub(crate) from: Option<TableSource>,
    pub(crate) joins: Vec<JoinTable>,
    pub(crate) where_: VariadicPredicate,
    pub(crate) group_by: Vec<Field>,
    pub(crate) having: VariadicPredicate,
    pub(crate) order_by: Vec<Field>,
    pub(crate) limit: Option<i64>,
    pub(crate) offset: Option<i64>,
}

impl SelectQuery {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Prepend a `WITH` list.
    pub fn with<I>(mut self, ctes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Cte>,
    {
        self.ctes.extend(ctes.into_iter().map(Into::into));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Append projected fields.
    pub fn fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoField,
    {
        self.fields
            .extend(fields.into_iter().map(IntoField::into_field));
        self
    }

    pub fn from(mut self, table: impl Into<TableSource>) -> Self {
        self.from = Some(table.into());
        self
    }

    /// Append a prepared join clause.
    pub fn join_table(mut self, join: JoinTable) -> Self {
        self.joins.push(join);
        self
    }

    pub fn join(
        self,
        table: impl Into<TableSource>,
        on: impl IntoIterator<Item = Predicate>,
    ) -> Self {
        self.join_table(JoinTable::new(JoinType::Inner, table, on))
    }

    pub fn left_join(
        self,
        table: impl Into<TableSource>,
        on: impl IntoIterator<Item = Predicate>,
    ) -> Self {
        self.join_table(JoinTable::new(JoinType::Left, table, on))
    }

    pub fn right_join(
        self,
        table: impl Into<TableSource>,
        on: impl IntoIterator<Item = Predicate>,
    ) -> Self {
        self.join_table(JoinTable::new(JoinType::Right, table, on))
    }

    pub fn full_join(
        self,
        table: impl Into<TableSource>,
        on: impl IntoIterator<Item = Predicate>,
    ) -> Self {
        self.join_table(JoinTable::new(JoinType::Full, table, on))
    }

    pub fn custom_join(
        self,
        keyword: impl Into<String>,
        table: impl Into<TableSource>,
        on: impl IntoIterator<Item = Predicate>,
    ) -> Self {
        self.join_table(JoinTable::new(JoinType::Custom(keyword.into()), table, on))
    }

    /// Add WHERE conditions, AND-ed with any existing ones.
    pub fn where_(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.where_.predicates.extend(predicates);
        self
    }

    pub fn group_by<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoField,
    {
        self.group_by
            .extend(fields.into_iter().map(IntoField::into_field));
        self
    }

    /// Add HAVING conditions, AND-ed with any existing ones.
    pub fn having(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.having.predicates.extend(predicates);
        self
    }

    /// Append ORDER BY fields; use [`Field::asc`] / [`Field::desc`] for direction.
    pub fn order_by<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoField,
    {
        self.order_by
            .extend(fields.into_iter().map(IntoField::into_field));
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Projected fields, in order.
    pub fn projected(&self) -> &[Field] {
        &self.fields
    }

    fn node(&self) -> String {
        self.statement_id().to_string()
    }
}

/// Raw fragments whose column count cannot be known without parsing them:
/// stars and comma-separated lists such as `1, 2`.
fn has_unknown_width(field: &Field) -> bool {
    match &field.kind {
        FieldKind::Expr { format, operands } => {
            operands.is_empty()
                && (format.trim() == "*"
                    || format.trim_end().ends_with(".*")
                    || has_top_level_comma(format))
        }
        _ => false,
    }
}

fn has_top_level_comma(sql: &str) -> bool {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

impl SqlStatement for SelectQuery {
    fn append_sql(&self, r: &mut Renderer) -> SqResult<()> {
        if self.fields.is_empty() {
            return Err(SqError::render(self.node(), "no fields to select"));
        }
        if self.offset.is_some_and(|n| n < 0) || self.limit.is_some_and(|n| n < 0) {
            return Err(SqError::render(self.node(), "LIMIT and OFFSET must not be negative"));
        }

        append_with_sql(&self.ctes, r)?;
        r.push(if self.distinct { "SELECT DISTINCT " } else { "SELECT " });
        append_fields_sql(&self.fields, r, &[])?;

        if let Some(from) = &self.from {
            r.push(" FROM ");
            from.append_sql(r)?;
        } else if !self.joins.is_empty() {
            return Err(SqError::render(self.node(), "joins require a FROM table"));
        }
        if !self.joins.is_empty() {
            r.push_char(' ');
            append_joins_sql(&self.joins, r)?;
        }

        if !self.where_.is_empty() {
            r.push(" WHERE ");
            self.where_.append_toplevel_sql(r, &[])?;
        }

        if !self.group_by.is_empty() {
            r.push(" GROUP BY ");
            for (i, field) in self.group_by.iter().enumerate() {
                if i > 0 {
                    r.push(", ");
                }
                field.append_sql(r, &[])?;
            }
        }

        if !self.having.is_empty() {
            r.push(" HAVING ");
            self.having.append_toplevel_sql(r, &[])?;
        }

        if !self.order_by.is_empty() {
            r.push(" ORDER BY ");
            for (i, field) in self.order_by.iter().enumerate() {
                if i > 0 {
                    r.push(", ");
                }
                field.append_order_sql(r, &[])?;
            }
        }

        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                r.push(&format!(" LIMIT {limit}"));
                if let Some(offset) = offset {
                    r.push(&format!(" OFFSET {offset}"));
                }
            }
            // sqlite and mysql only accept OFFSET after a LIMIT
            (None, Some(offset)) => match r.dialect() {
                Dialect::Postgres => {
                    r.push(&format!(" OFFSET {offset}"));
                }
                Dialect::Sqlite => {
                    r.push(&format!(" LIMIT -1 OFFSET {offset}"));
                }
                Dialect::MySql => {
                    r.push(&format!(" LIMIT 18446744073709551615 OFFSET {offset}"));
                }
            },
            (None, None) => {}
        }
        Ok(())
    }

    fn statement_id(&self) -> StatementId {
        StatementId::new(
            StatementKind::Select,
            self.from.as_ref().map(TableSource::display_name),
        )
    }

    fn returns_rows(&self) -> bool {
        true
    }

    fn projection_len(&self) -> Option<usize> {
        if self.fields.is_empty() || self.fields.iter().any(has_unknown_width) {
            None
        } else {
            Some(self.fields.len())
        }
    }
}
