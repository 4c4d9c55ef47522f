//! INSERT builder.

use crate::assignment::{Assignment, Assignments, ColumnSetter, collect_row};
use crate::cte::{Cte, append_with_sql};
use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::field::{Field, FieldKind, IntoField, TableInfo};
use crate::query::{SelectQuery, SqlStatement, StatementId, StatementKind, append_fields_sql};
use crate::render::Renderer;

/// What to do when an inserted row collides with an existing one.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConflictAction {
    DoNothing,
    DoUpdate(Assignments),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OnConflict {
    fields: Vec<Field>,
    action: ConflictAction,
}

/// INSERT statement builder.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct InsertQuery {
    pub(crate) ctes: Vec<Cte>,
    pub(crate) table: TableInfo,
    pub(crate) columns: Vec<Field>,
    pub(crate) rows: Vec<Vec<Field>>,
    pub(crate) select: Option<Box<SelectQuery>>,
    pub(crate) conflict: Option<OnConflict>,
    pub(crate) returning: Vec<Field>,
    /// First inconsistency found while collecting rows; reported at render.
    pub(crate) build_error: Option<String>,
}

impl InsertQuery {
    pub fn new(table: TableInfo) -> Self {
        Self {
            ctes: Vec::new(),
            table,
            columns: Vec::new(),
            rows: Vec::new(),
            select: None,
            conflict: None,
            returning: Vec::new(),
            build_error: None,
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

    /// Set the column list used by [`values`](Self::values) and [`select`](Self::select).
    pub fn columns<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoField,
    {
        self.columns = columns.into_iter().map(IntoField::into_field).collect();
        self
    }

    /// Append one row of values matching the column list.
    pub fn values<I>(mut self, row: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoField,
    {
        let row: Vec<Field> = row.into_iter().map(IntoField::into_field).collect();
        if row.len() != self.columns.len() {
            self.fail(format!(
                "row {} has {} value(s) for {} column(s)",
                self.rows.len() + 1,
                row.len(),
                self.columns.len()
            ));
        }
        self.rows.push(row);
        self
    }

    /// Append one row built by `f`.
    ///
    /// The first row fixes the column order; later rows must set exactly the
    /// same columns, in any order.
    pub fn valuesx(mut self, f: impl FnOnce(&mut ColumnSetter)) -> Self {
        let entries = collect_row(f);
        self.push_entries(entries);
        self
    }

    /// Append one row per item, each built by `f`.
    pub fn valuesx_each<T, I, F>(mut self, items: I, mut f: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&mut ColumnSetter, T),
    {
        for item in items {
            let entries = collect_row(|col| f(col, item));
            self.push_entries(entries);
        }
        self
    }

    fn push_entries(&mut self, entries: Vec<(Field, Field)>) {
        let row_no = self.rows.len() + 1;
        if self.rows.is_empty() && self.columns.is_empty() {
            let (columns, row) = entries.into_iter().unzip();
            self.columns = columns;
            self.rows.push(row);
            return;
        }

        let mut row: Vec<Option<Field>> = vec![None; self.columns.len()];
        for (column, value) in entries {
            match self.columns.iter().position(|c| c.same_expr(&column)) {
                Some(idx) => row[idx] = Some(value),
                None => {
                    self.fail(format!(
                        "row {row_no} sets column `{}` which the first row did not",
                        column.name()
                    ));
                    return;
                }
            }
        }
        let mut values = Vec::with_capacity(row.len());
        for (idx, value) in row.into_iter().enumerate() {
            match value {
                Some(v) => values.push(v),
                None => {
                    self.fail(format!(
                        "row {row_no} does not set column `{}`",
                        self.columns[idx].name()
                    ));
                    return;
                }
            }
        }
        self.rows.push(values);
    }

    fn fail(&mut self, message: String) {
        if self.build_error.is_none() {
            self.build_error = Some(message);
        }
    }

    /// `INSERT INTO table (columns) SELECT ...`
    pub fn select(mut self, query: SelectQuery) -> Self {
        self.select = Some(Box::new(query));
        self
    }

    /// Start an upsert clause on the given conflict target.
    pub fn on_conflict<I>(self, fields: I) -> OnConflictBuilder
    where
        I: IntoIterator,
        I::Item: IntoField,
    {
        OnConflictBuilder {
            query: self,
            fields: fields.into_iter().map(IntoField::into_field).collect(),
        }
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
        format!("INSERT INTO `{}`", self.table.name)
    }

    fn append_column_list(&self, fields: &[Field], r: &mut Renderer) -> SqResult<()> {
        r.push_char('(');
        for (i, field) in fields.iter().enumerate() {
            if !matches!(field.kind, FieldKind::Column { .. }) {
                return Err(SqError::render(
                    self.node(),
                    format!("`{field}` is not a column"),
                ));
            }
            if i > 0 {
                r.push(", ");
            }
            r.push_ident(field.name())?;
        }
        r.push_char(')');
        Ok(())
    }
}

/// Pending `ON CONFLICT` clause.
#[must_use]
pub struct OnConflictBuilder {
    query: InsertQuery,
    fields: Vec<Field>,
}

impl OnConflictBuilder {
    /// `ON CONFLICT DO NOTHING` (`INSERT IGNORE` on mysql).
    pub fn do_nothing(mut self) -> InsertQuery {
        self.query.conflict = Some(OnConflict {
            fields: self.fields,
            action: ConflictAction::DoNothing,
        });
        self.query
    }

    /// `ON CONFLICT DO UPDATE SET ...` (`ON DUPLICATE KEY UPDATE` on mysql).
    pub fn do_update_set(mut self, assignments: impl IntoIterator<Item = Assignment>) -> InsertQuery {
        self.query.conflict = Some(OnConflict {
            fields: self.fields,
            action: ConflictAction::DoUpdate(assignments.into_iter().collect()),
        });
        self.query
    }

    /// Like [`do_update_set`](Self::do_update_set) with a column setter.
    pub fn do_update_setx(self, f: impl FnOnce(&mut ColumnSetter)) -> InsertQuery {
        let mut col = ColumnSetter::default();
        f(&mut col);
        let assignments = col.into_assignments();
        self.do_update_set(assignments.0)
    }
}

impl SqlStatement for InsertQuery {
    fn append_sql(&self, r: &mut Renderer) -> SqResult<()> {
        if let Some(message) = &self.build_error {
            return Err(SqError::render(self.node(), message.clone()));
        }
        let dialect = r.dialect();
        if !self.returning.is_empty() && !dialect.supports_returning() {
            return Err(SqError::render(
                self.node(),
                format!("{dialect} does not support RETURNING"),
            ));
        }
        let qualifier = self.table.qualifier();

        append_with_sql(&self.ctes, r)?;
        r.push("INSERT ");
        if dialect == Dialect::MySql
            && matches!(&self.conflict, Some(c) if c.action == ConflictAction::DoNothing)
        {
            r.push("IGNORE ");
        }
        r.push("INTO ");
        if dialect == Dialect::MySql {
            self.table.append_name_sql(r)?;
        } else {
            self.table.append_sql(r)?;
        }

        if !self.columns.is_empty() {
            r.push_char(' ');
            self.append_column_list(&self.columns, r)?;
        }

        if let Some(select) = &self.select {
            r.push_char(' ');
            select.append_sql(r)?;
        } else if !self.rows.is_empty() {
            r.push(" VALUES ");
            for (i, row) in self.rows.iter().enumerate() {
                if i > 0 {
                    r.push(", ");
                }
                r.push_char('(');
                for (j, value) in row.iter().enumerate() {
                    if j > 0 {
                        r.push(", ");
                    }
                    value.append_sql(r, &[qualifier])?;
                }
                r.push_char(')');
            }
        } else if !self.columns.is_empty() {
            return Err(SqError::render(self.node(), "columns given but no values"));
        } else if dialect == Dialect::MySql {
            r.push(" () VALUES ()");
        } else {
            r.push(" DEFAULT VALUES");
        }

        if let Some(conflict) = &self.conflict {
            match (&conflict.action, dialect.supports_on_conflict()) {
                (ConflictAction::DoNothing, false) => {}
                (ConflictAction::DoUpdate(assignments), false) => {
                    if assignments.is_empty() {
                        return Err(SqError::render(self.node(), "upsert has no assignments"));
                    }
                    r.push(" ON DUPLICATE KEY UPDATE ");
                    assignments.append_sql(r, &[qualifier])?;
                }
                (action, true) => {
                    r.push(" ON CONFLICT");
                    if !conflict.fields.is_empty() {
                        r.push_char(' ');
                        self.append_column_list(&conflict.fields, r)?;
                    }
                    match action {
                        ConflictAction::DoNothing => {
                            r.push(" DO NOTHING");
                        }
                        ConflictAction::DoUpdate(assignments) => {
                            if conflict.fields.is_empty() {
                                return Err(SqError::render(
                                    self.node(),
                                    "ON CONFLICT DO UPDATE needs a conflict target",
                                ));
                            }
                            if assignments.is_empty() {
                                return Err(SqError::render(self.node(), "upsert has no assignments"));
                            }
                            r.push(" DO UPDATE SET ");
                            assignments.append_sql(r, &[qualifier])?;
                        }
                    }
                }
            }
        }

        if !self.returning.is_empty() {
            r.push(" RETURNING ");
            append_fields_sql(&self.returning, r, &[qualifier])?;
        }
        Ok(())
    }

    fn statement_id(&self) -> StatementId {
        StatementId::new(StatementKind::Insert, Some(&self.table.name))
    }

    fn returns_rows(&self) -> bool {
        !self.returning.is_empty()
    }

    fn projection_len(&self) -> Option<usize> {
        (!self.returning.is_empty()).then_some(self.returning.len())
    }
}
