//! Column assignments for `UPDATE ... SET` and upsert `DO UPDATE SET`, plus
//! the closure-driven column setter used by `valuesx` / `setx`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::SqResult;
use crate::field::{Field, IntoField};
use crate::render::Renderer;
use crate::value::Value;

/// One `field = rhs` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub field: Field,
    pub value: Field,
}

impl Assignment {
    /// Both sides honour the exclusion set.
    pub fn append_sql(&self, r: &mut Renderer, excluded: &[&str]) -> SqResult<()> {
        self.append_split_sql(r, excluded, excluded)
    }

    /// Render with separate exclusion sets for the target column and the
    /// right-hand side.
    pub fn append_split_sql(
        &self,
        r: &mut Renderer,
        target_excluded: &[&str],
        value_excluded: &[&str],
    ) -> SqResult<()> {
        self.field.append_sql(r, target_excluded)?;
        r.push(" = ");
        self.value.append_sql(r, value_excluded)
    }
}

/// Build one assignment. `rhs` is either another field or a literal value.
pub fn assign(field: &Field, rhs: impl IntoField) -> Assignment {
    Assignment {
        field: field.clone(),
        value: rhs.into_field(),
    }
}

impl Field {
    /// `self = rhs`, see [`assign`].
    pub fn set(&self, rhs: impl IntoField) -> Assignment {
        assign(self, rhs)
    }
}

/// Assignments rendered comma-joined in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assignments(pub Vec<Assignment>);

impl Assignments {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn append_sql(&self, r: &mut Renderer, excluded: &[&str]) -> SqResult<()> {
        self.append_split_sql(r, excluded, excluded)
    }

    pub fn append_split_sql(
        &self,
        r: &mut Renderer,
        target_excluded: &[&str],
        value_excluded: &[&str],
    ) -> SqResult<()> {
        for (i, assignment) in self.0.iter().enumerate() {
            if i > 0 {
                r.push(", ");
            }
            assignment.append_split_sql(r, target_excluded, value_excluded)?;
        }
        Ok(())
    }
}

impl FromIterator<Assignment> for Assignments {
    fn from_iter<I: IntoIterator<Item = Assignment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Assignment> for Assignments {
    fn extend<I: IntoIterator<Item = Assignment>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Collects one row of column values inside a `valuesx` / `setx` closure.
///
/// The first value set for a column wins; later calls for the same column in
/// the same row are ignored.
#[derive(Debug, Default)]
pub struct ColumnSetter {
    entries: Vec<(Field, Field)>,
}

impl ColumnSetter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Set `field` to a value or another field.
    pub fn set(&mut self, field: &Field, value: impl IntoField) -> &mut Self {
        if !self.entries.iter().any(|(f, _)| f.same_expr(field)) {
            self.entries.push((field.clone(), value.into_field()));
        }
        self
    }

    pub fn set_string(&mut self, field: &Field, value: impl Into<String>) -> &mut Self {
        self.set(field, Value::Text(value.into()))
    }

    pub fn set_int64(&mut self, field: &Field, value: i64) -> &mut Self {
        self.set(field, Value::Int(value))
    }

    pub fn set_float64(&mut self, field: &Field, value: f64) -> &mut Self {
        self.set(field, Value::Float(value))
    }

    pub fn set_bool(&mut self, field: &Field, value: bool) -> &mut Self {
        self.set(field, Value::Bool(value))
    }

    pub fn set_blob(&mut self, field: &Field, value: impl Into<Vec<u8>>) -> &mut Self {
        self.set(field, Value::Bytes(value.into()))
    }

    pub fn set_time(&mut self, field: &Field, value: DateTime<Utc>) -> &mut Self {
        self.set(field, Value::Timestamp(value))
    }

    pub fn set_uuid(&mut self, field: &Field, value: Uuid) -> &mut Self {
        self.set(field, Value::Uuid(value))
    }

    pub fn set_null(&mut self, field: &Field) -> &mut Self {
        self.set(field, Value::Null)
    }

    /// Serialize `value` as JSON. Encoding failures are bound as NULL and
    /// reported through `tracing`.
    pub fn set_json<T: Serialize>(&mut self, field: &Field, value: &T) -> &mut Self {
        let value = match Value::json(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "sqkit::exec", column = %field.label(), error = %e, "binding NULL for unencodable JSON value");
                Value::Null
            }
        };
        self.set(field, value)
    }

    pub(crate) fn into_entries(self) -> Vec<(Field, Field)> {
        self.entries
    }

    pub(crate) fn into_assignments(self) -> Assignments {
        self.entries
            .into_iter()
            .map(|(field, value)| Assignment { field, value })
            .collect()
    }
}

/// Run `f` against a fresh setter and return the collected row.
pub(crate) fn collect_row(f: impl FnOnce(&mut ColumnSetter)) -> Vec<(Field, Field)> {
    let mut col = ColumnSetter::new();
    f(&mut col);
    col.into_entries()
}
