//! Field model: the leaf expressions of every query tree.
//!
//! A [`Field`] is an immutable value. Builder methods such as [`Field::alias`]
//! or [`Field::desc`] return a modified copy, so catalog fields can be reused
//! freely across queries.
//!
//! Rendering comes in three flavours, chosen by the caller:
//! - [`Field::append_sql`] writes the bare expression (predicates, assignments,
//!   `GROUP BY`, expression operands).
//! - `append_select_sql` adds ` AS alias` for projections.
//! - `append_order_sql` adds the sort direction and null ordering.
//!
//! Every flavour takes an exclusion set of qualifiers. A column whose
//! qualifier is excluded renders as its bare name.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::query::{Query, SqlStatement};
use crate::render::Renderer;
use crate::value::Value;

/// A physical table as described by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableInfo {
    pub schema: Option<String>,
    pub name: String,
    pub alias: Option<String>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            alias: None,
        }
    }

    /// Set the schema the table lives in.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the alias. An empty alias clears it.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        self.alias = (!alias.is_empty()).then_some(alias);
        self
    }

    /// The prefix used for column references: the alias, else the name.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Write `[schema.]name`.
    pub(crate) fn append_name_sql(&self, r: &mut Renderer) -> SqResult<()> {
        if let Some(schema) = &self.schema {
            r.push_ident(schema)?.push_char('.');
        }
        r.push_ident(&self.name)?;
        Ok(())
    }

    /// Write `[schema.]name [AS alias]`.
    pub(crate) fn append_sql(&self, r: &mut Renderer) -> SqResult<()> {
        self.append_name_sql(r)?;
        if let Some(alias) = &self.alias {
            r.push(" AS ").push_ident(alias)?;
        }
        Ok(())
    }
}

impl From<&TableInfo> for TableInfo {
    fn from(t: &TableInfo) -> Self {
        t.clone()
    }
}

/// Column type as declared by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldType {
    Blob,
    Boolean,
    Json,
    Number,
    String,
    Time,
    Uuid,
    #[default]
    Custom,
}

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// Null ordering for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldKind {
    /// `qualifier.name`, qualifier may be empty.
    Column {
        table: String,
        table_alias: String,
        name: String,
        ty: FieldType,
    },
    /// The proposed row of an upsert: `EXCLUDED.name` or `VALUES(name)`.
    Excluded(String),
    /// A bound literal.
    Value(Value),
    /// A bound literal sharing one placeholder per name.
    Named { name: String, value: Value },
    /// Template with `?` operand slots.
    Expr { format: String, operands: Vec<Field> },
    /// Scalar subquery.
    Subquery(Box<Query>),
}

/// One SQL-renderable expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub(crate) kind: FieldKind,
    alias: Option<String>,
    sort: Option<SortDir>,
    nulls: Option<NullsOrder>,
}

impl Field {
    fn from_kind(kind: FieldKind) -> Self {
        Self {
            kind,
            alias: None,
            sort: None,
            nulls: None,
        }
    }

    /// A column owned by `table`.
    pub fn new(table: &TableInfo, name: impl Into<String>, ty: FieldType) -> Self {
        Self::from_kind(FieldKind::Column {
            table: table.name.clone(),
            table_alias: table.alias.clone().unwrap_or_default(),
            name: name.into(),
            ty,
        })
    }

    /// An unqualified column reference.
    pub fn column(name: impl Into<String>) -> Self {
        Self::qualified("", name)
    }

    /// A column reference with an explicit qualifier (a subquery or CTE name).
    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_kind(FieldKind::Column {
            table: qualifier.into(),
            table_alias: String::new(),
            name: name.into(),
            ty: FieldType::Custom,
        })
    }

    /// A literal bound as an argument.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::from_kind(FieldKind::Value(value.into()))
    }

    /// A named literal. Every occurrence of `name` in one statement shares a
    /// placeholder in numbered dialects.
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::from_kind(FieldKind::Named {
            name: name.into(),
            value: value.into(),
        })
    }

    /// An expression template. Each `?` in `format` is replaced by the next
    /// operand; `?` beyond the last operand is written literally.
    ///
    /// ```ignore
    /// Field::expr("COALESCE(?, ?)", [u.nickname.clone(), Field::value("anon")])
    /// ```
    pub fn expr<I>(format: impl Into<String>, operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoField,
    {
        Self::from_kind(FieldKind::Expr {
            format: format.into(),
            operands: operands.into_iter().map(IntoField::into_field).collect(),
        })
    }

    /// A raw SQL fragment with no operands.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::from_kind(FieldKind::Expr {
            format: sql.into(),
            operands: Vec::new(),
        })
    }

    /// A parenthesized scalar subquery.
    pub fn subquery(query: impl Into<Query>) -> Self {
        Self::from_kind(FieldKind::Subquery(Box::new(query.into())))
    }

    /// The value proposed for `column` by an upsert.
    pub fn excluded(column: &Field) -> Self {
        Self::from_kind(FieldKind::Excluded(column.name().to_string()))
    }

    /// Return a copy of this field projected under `alias`.
    pub fn alias(&self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self {
            alias: (!alias.is_empty()).then_some(alias),
            ..self.clone()
        }
    }

    pub fn asc(&self) -> Self {
        Self {
            sort: Some(SortDir::Asc),
            ..self.clone()
        }
    }

    pub fn desc(&self) -> Self {
        Self {
            sort: Some(SortDir::Desc),
            ..self.clone()
        }
    }

    pub fn nulls_first(&self) -> Self {
        Self {
            nulls: Some(NullsOrder::First),
            ..self.clone()
        }
    }

    pub fn nulls_last(&self) -> Self {
        Self {
            nulls: Some(NullsOrder::Last),
            ..self.clone()
        }
    }

    /// Column name, or empty for non-column fields.
    pub fn name(&self) -> &str {
        match &self.kind {
            FieldKind::Column { name, .. } | FieldKind::Excluded(name) => name,
            _ => "",
        }
    }

    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Name of the owning table, or empty.
    pub fn table_name(&self) -> &str {
        match &self.kind {
            FieldKind::Column { table, .. } => table,
            _ => "",
        }
    }

    /// Qualifier used when rendering: table alias, else table name.
    pub fn qualifier(&self) -> &str {
        match &self.kind {
            FieldKind::Column {
                table, table_alias, ..
            } if table_alias.is_empty() => table,
            FieldKind::Column { table_alias, .. } => table_alias,
            _ => "",
        }
    }

    pub fn field_type(&self) -> FieldType {
        match &self.kind {
            FieldKind::Column { ty, .. } => *ty,
            _ => FieldType::Custom,
        }
    }

    /// Name of the output column this field produces: the alias if set,
    /// else the column name.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.name())
    }

    /// Whether both fields denote the same expression, ignoring alias and
    /// ordering metadata.
    pub fn same_expr(&self, other: &Field) -> bool {
        self.kind == other.kind
    }

    /// Human-readable label used in decode errors.
    pub(crate) fn label(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.kind {
            FieldKind::Column { name, .. } => {
                let qualifier = self.qualifier();
                if qualifier.is_empty() {
                    name.clone()
                } else {
                    format!("{qualifier}.{name}")
                }
            }
            _ => self.to_string(),
        }
    }

    /// Write the bare expression.
    pub fn append_sql(&self, r: &mut Renderer, excluded: &[&str]) -> SqResult<()> {
        match &self.kind {
            FieldKind::Column { name, .. } => {
                let qualifier = self.qualifier();
                if !qualifier.is_empty() && !excluded.contains(&qualifier) {
                    r.push_ident(qualifier)?.push_char('.');
                }
                r.push_ident(name)?;
            }
            FieldKind::Excluded(name) => match r.dialect() {
                Dialect::MySql => {
                    r.push("VALUES(").push_ident(name)?.push_char(')');
                }
                Dialect::Sqlite | Dialect::Postgres => {
                    r.push("EXCLUDED.").push_ident(name)?;
                }
            },
            FieldKind::Value(value) => {
                r.push_arg(value.clone());
            }
            FieldKind::Named { name, value } => {
                r.push_named_arg(name, value);
            }
            FieldKind::Expr { format, operands } => {
                let mut operands = operands.iter();
                let mut rest = format.as_str();
                while let Some(pos) = rest.find('?') {
                    r.push(&rest[..pos]);
                    match operands.next() {
                        Some(operand) => operand.append_sql(r, excluded)?,
                        None => {
                            r.push_char('?');
                        }
                    }
                    rest = &rest[pos + 1..];
                }
                r.push(rest);
                let unused = operands.count();
                if unused > 0 {
                    return Err(SqError::render(
                        format!("expression `{format}`"),
                        format!("{unused} operand(s) have no `?` slot"),
                    ));
                }
            }
            FieldKind::Subquery(query) => {
                r.push_char('(');
                query.append_sql(r)?;
                r.push_char(')');
            }
        }
        Ok(())
    }

    /// Write the expression followed by ` AS alias` when aliased.
    pub(crate) fn append_select_sql(&self, r: &mut Renderer, excluded: &[&str]) -> SqResult<()> {
        self.append_sql(r, excluded)?;
        if let Some(alias) = &self.alias {
            r.push(" AS ").push_ident(alias)?;
        }
        Ok(())
    }

    /// Write the expression followed by its sort direction and null ordering.
    pub(crate) fn append_order_sql(&self, r: &mut Renderer, excluded: &[&str]) -> SqResult<()> {
        self.append_sql(r, excluded)?;
        match self.sort {
            Some(SortDir::Asc) => {
                r.push(" ASC");
            }
            Some(SortDir::Desc) => {
                r.push(" DESC");
            }
            None => {}
        }
        if let Some(nulls) = self.nulls {
            if r.dialect() == Dialect::MySql {
                return Err(SqError::render(
                    format!("ORDER BY {}", self.label()),
                    "mysql does not support NULLS FIRST/LAST",
                ));
            }
            r.push(match nulls {
                NullsOrder::First => " NULLS FIRST",
                NullsOrder::Last => " NULLS LAST",
            });
        }
        Ok(())
    }
}

impl fmt::Display for Field {
    /// Renders with the default dialect and no exclusions.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut r = Renderer::new(Dialect::default());
        match self.append_sql(&mut r, &[]) {
            Ok(()) => f.write_str(r.sql()),
            Err(_) => f.write_str(self.name()),
        }
    }
}

/// `COUNT(*)`.
pub fn count_star() -> Field {
    Field::raw("COUNT(*)")
}

/// Conversion into a [`Field`]; plain values become bound literals.
pub trait IntoField {
    fn into_field(self) -> Field;
}

impl IntoField for Field {
    fn into_field(self) -> Field {
        self
    }
}

impl IntoField for &Field {
    fn into_field(self) -> Field {
        self.clone()
    }
}

impl IntoField for Value {
    fn into_field(self) -> Field {
        Field::value(self)
    }
}

macro_rules! impl_into_field_for_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoField for $t {
                fn into_field(self) -> Field {
                    Field::value(self)
                }
            }
        )*
    };
}

impl_into_field_for_value!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    &str,
    String,
    &String,
    Vec<u8>,
    &[u8],
    DateTime<Utc>,
    NaiveDateTime,
    Uuid,
    serde_json::Value,
);

impl<T: Into<Value>> IntoField for Option<T> {
    fn into_field(self) -> Field {
        Field::value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableInfo {
        TableInfo::new("users").with_alias("u")
    }

    fn render(f: &Field, dialect: Dialect, excluded: &[&str]) -> (String, Vec<Value>) {
        let mut r = Renderer::new(dialect);
        f.append_sql(&mut r, excluded).unwrap();
        let built = r.finish();
        (built.sql, built.args)
    }

    #[test]
    fn column_uses_alias_as_qualifier() {
        let f = Field::new(&users(), "user_id", FieldType::Number);
        assert_eq!(render(&f, Dialect::Sqlite, &[]).0, "u.user_id");
    }

    #[test]
    fn column_without_alias_uses_table_name() {
        let f = Field::new(&TableInfo::new("users"), "user_id", FieldType::Number);
        assert_eq!(render(&f, Dialect::Sqlite, &[]).0, "users.user_id");
    }

    #[test]
    fn excluded_qualifier_is_dropped() {
        let f = Field::new(&users(), "user_id", FieldType::Number);
        assert_eq!(render(&f, Dialect::Sqlite, &["u"]).0, "user_id");
        assert_eq!(render(&f, Dialect::Sqlite, &["users"]).0, "u.user_id");
    }

    #[test]
    fn blob_field_orders_ascending_without_qualifier() {
        let tbl = TableInfo::new("tbl");
        let f = Field::new(&tbl, "my_field", FieldType::Blob).asc();
        let mut r = Renderer::new(Dialect::Sqlite);
        f.append_order_sql(&mut r, &["tbl"]).unwrap();
        assert_eq!(r.sql(), "my_field ASC");
    }

    #[test]
    fn order_suffix_only_in_order_context() {
        let f = Field::new(&users(), "created_at", FieldType::Time)
            .desc()
            .nulls_last();
        assert_eq!(render(&f, Dialect::Postgres, &[]).0, "u.created_at");

        let mut r = Renderer::new(Dialect::Postgres);
        f.append_order_sql(&mut r, &[]).unwrap();
        assert_eq!(r.sql(), "u.created_at DESC NULLS LAST");

        let mut r = Renderer::new(Dialect::MySql);
        assert!(f.append_order_sql(&mut r, &[]).unwrap_err().is_render());
    }

    #[test]
    fn builders_do_not_mutate_receiver() {
        let f = Field::new(&users(), "name", FieldType::String);
        let g = f.alias("n").desc();
        assert_eq!(f.alias_name(), None);
        assert_eq!(g.alias_name(), Some("n"));
        assert!(f.same_expr(&g));
        assert_ne!(f, g);
    }

    #[test]
    fn select_rendering_appends_alias() {
        let f = Field::new(&users(), "name", FieldType::String).alias("display");
        let mut r = Renderer::new(Dialect::Sqlite);
        f.append_select_sql(&mut r, &[]).unwrap();
        assert_eq!(r.sql(), "u.name AS display");
    }

    #[test]
    fn literal_binds_argument() {
        let (sql, args) = render(&Field::value(5), Dialect::Postgres, &[]);
        assert_eq!(sql, "$1");
        assert_eq!(args, vec![Value::Int(5)]);
    }

    #[test]
    fn expr_fills_slots_in_order() {
        let name = Field::new(&users(), "name", FieldType::String);
        let f = Field::expr("COALESCE(?, ?)", [name, Field::value("anon")]);
        let (sql, args) = render(&f, Dialect::Sqlite, &[]);
        assert_eq!(sql, "COALESCE(u.name, ?)");
        assert_eq!(args, vec![Value::from("anon")]);
    }

    #[test]
    fn expr_with_unused_operand_fails() {
        let f = Field::expr("lower(?)", [Field::value(1), Field::value(2)]);
        let mut r = Renderer::new(Dialect::Sqlite);
        assert!(f.append_sql(&mut r, &[]).unwrap_err().is_render());
    }

    #[test]
    fn excluded_follows_dialect() {
        let email = Field::new(&users(), "email", FieldType::String);
        let f = Field::excluded(&email);
        assert_eq!(render(&f, Dialect::Postgres, &[]).0, "EXCLUDED.email");
        assert_eq!(render(&f, Dialect::MySql, &[]).0, "VALUES(email)");
    }

    #[test]
    fn odd_identifiers_are_quoted() {
        let t = TableInfo::new("order items");
        let f = Field::new(&t, "unit price", FieldType::Number);
        assert_eq!(
            render(&f, Dialect::MySql, &[]).0,
            "`order items`.`unit price`"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let f = Field::expr(
            "? || ?",
            [
                Field::new(&users(), "name", FieldType::String),
                Field::named("suffix", "!"),
            ],
        );
        for dialect in [Dialect::Sqlite, Dialect::Postgres, Dialect::MySql] {
            assert_eq!(render(&f, dialect, &["u"]), render(&f, dialect, &["u"]));
        }
    }
}
