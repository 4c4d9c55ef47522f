//! UPDATE builder.

use crate::assignment::{Assignment, Assignments, ColumnSetter};
use crate::cte::{Cte, append_with_sql};
use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::field::{Field, IntoField, TableInfo};
use crate::join::{JoinTable, JoinType, append_joins_sql};
use crate::predicate::{Predicate, VariadicPredicate};
use crate::query::{SqlStatement, StatementId, StatementKind, append_fields_sql};
use crate::render::Renderer;
use crate::table::TableSource;

/// UPDATE statement builder.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct UpdateQuery {
    pub(crate) ctes: Vec<Cte>,
    pub(crate) table: TableInfo,
    pub(crate) assignments: Assignments,
    pub(crate) from: Option<TableSource>,
    pub(crate) joins: Vec<JoinTable>,
    pub(crate) where_: VariadicPredicate,
    pub(crate) returning: Vec<Field>,
}

impl UpdateQuery {
    pub fn new(table: TableInfo) -> Self {
        Self {
            ctes: Vec::new(),
            table,
            assignments: Assignments::default(),
            from: None,
            joins: Vec::new(),
            where_: VariadicPredicate::default(),
            returning: Vec::new(),
        }
    }

    pub fn with<I>(mut self, ctes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Cte>,
    {
        self.ctes.extend(ctes.into_iter().map(Into::into));
        self
    }

    /// Append assignments in order.
    pub fn set(mut self, assignments: impl IntoIterator<Item = Assignment>) -> Self {
        self.assignments.extend(assignments);
        self
    }

    /// Append assignments collected by a column setter.
    pub fn setx(mut self, f: impl FnOnce(&mut ColumnSetter)) -> Self {
        let mut col = ColumnSetter::default();
        f(&mut col);
        self.assignments.extend(col.into_assignments().0);
        self
    }

    /// `UPDATE ... FROM table` (a comma join on mysql).
    pub fn from(mut self, table: impl Into<TableSource>) -> Self {
        self.from = Some(table.into());
        self
    }

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

    pub fn where_(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.where_.predicates.extend(predicates);
        self
    }

    pub fn returning<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoField,
    {
        self.returning
            .extend(fields.into_iter().map(IntoField::into_field));
        self
    }

    fn node(&self) -> String {
        format!("UPDATE `{}`", self.table.name)
    }
}

impl SqlStatement for UpdateQuery {
    fn append_sql(&self, r: &mut Renderer) -> SqResult<()> {
        if self.assignments.is_empty() {
            return Err(SqError::render(self.node(), "no assignments"));
        }
        let dialect = r.dialect();
        if !self.returning.is_empty() && !dialect.supports_returning() {
            return Err(SqError::render(
                self.node(),
                format!("{dialect} does not support RETURNING"),
            ));
        }
        let multi_table = self.from.is_some() || !self.joins.is_empty();
        let qualifier = self.table.qualifier();

        append_with_sql(&self.ctes, r)?;
        r.push("UPDATE ");
        self.table.append_sql(r)?;

        if dialect == Dialect::MySql {
            if let Some(from) = &self.from {
                r.push(", ");
                from.append_sql(r)?;
            }
            if !self.joins.is_empty() {
                r.push_char(' ');
                append_joins_sql(&self.joins, r)?;
            }
            r.push(" SET ");
            // multi-table updates must keep qualifiers to stay unambiguous
            let own = [qualifier];
            let excluded: &[&str] = if multi_table { &[] } else { &own };
            self.assignments.append_sql(r, excluded)?;
        } else {
            r.push(" SET ");
            // the target column is always bare; values keep their qualifier
            // once another table is in scope
            let own = [qualifier];
            let value_excluded: &[&str] = if multi_table { &[] } else { &own };
            self.assignments.append_split_sql(r, &own, value_excluded)?;
            match &self.from {
                Some(from) => {
                    r.push(" FROM ");
                    from.append_sql(r)?;
                    if !self.joins.is_empty() {
                        r.push_char(' ');
                        append_joins_sql(&self.joins, r)?;
                    }
                }
                None if !self.joins.is_empty() => {
                    return Err(SqError::render(self.node(), "joins require a FROM table"));
                }
                None => {}
            }
        }

        if !self.where_.is_empty() {
            r.push(" WHERE ");
            self.where_.append_toplevel_sql(r, &[])?;
        }

        if !self.returning.is_empty() {
            r.push(" RETURNING ");
            let own = [qualifier];
            let excluded: &[&str] = if multi_table { &[] } else { &own };
            append_fields_sql(&self.returning, r, excluded)?;
        }
        Ok(())
    }

    fn statement_id(&self) -> StatementId {
        StatementId::new(StatementKind::Update, Some(&self.table.name))
    }

    fn returns_rows(&self) -> bool {
        !self.returning.is_empty()
    }

    fn projection_len(&self) -> Option<usize> {
        (!self.returning.is_empty()).then_some(self.returning.len())
    }
}
