//! DELETE builder.

use crate::cte::{Cte, append_with_sql};
use crate::error::{SqError, SqResult};
use crate::field::{Field, IntoField, TableInfo};
use crate::predicate::{Predicate, VariadicPredicate};
use crate::query::{SqlStatement, StatementId, StatementKind, append_fields_sql};
use crate::render::Renderer;

/// DELETE statement builder.
///
/// # Safety
/// A DELETE without WHERE conditions fails to render. Call
/// `allow_delete_all(true)` to delete every row on purpose.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct DeleteQuery {
    pub(crate) ctes: Vec<Cte>,
    pub(crate) table: TableInfo,
    pub(crate) where_: VariadicPredicate,
    pub(crate) returning: Vec<Field>,
    pub(crate) allow_delete_all: bool,
}

impl DeleteQuery {
    pub fn new(table: TableInfo) -> Self {
        Self {
            ctes: Vec::new(),
            table,
            where_: VariadicPredicate::default(),
            returning: Vec::new(),
            allow_delete_all: false,
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

    /// Allow a DELETE without WHERE conditions.
    pub fn allow_delete_all(mut self, allow: bool) -> Self {
        self.allow_delete_all = allow;
        self
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
        format!("DELETE FROM `{}`", self.table.name)
    }
}

impl SqlStatement for DeleteQuery {
    fn append_sql(&self, r: &mut Renderer) -> SqResult<()> {
        if self.where_.is_empty() && !self.allow_delete_all {
            return Err(SqError::render(
                self.node(),
                "no WHERE conditions; call allow_delete_all(true) to delete every row",
            ));
        }
        let dialect = r.dialect();
        if !self.returning.is_empty() && !dialect.supports_returning() {
            return Err(SqError::render(
                self.node(),
                format!("{dialect} does not support RETURNING"),
            ));
        }

        append_with_sql(&self.ctes, r)?;
        r.push("DELETE FROM ");
        self.table.append_sql(r)?;
        if !self.where_.is_empty() {
            r.push(" WHERE ");
            self.where_.append_toplevel_sql(r, &[])?;
        }
        if !self.returning.is_empty() {
            r.push(" RETURNING ");
            append_fields_sql(&self.returning, r, &[self.table.qualifier()])?;
        }
        Ok(())
    }

    fn statement_id(&self) -> StatementId {
        StatementId::new(StatementKind::Delete, Some(&self.table.name))
    }

    fn returns_rows(&self) -> bool {
        !self.returning.is_empty()
    }

    fn projection_len(&self) -> Option<usize> {
        (!self.returning.is_empty()).then_some(self.returning.len())
    }
}
