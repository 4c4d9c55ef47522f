//! Boolean predicate trees for `WHERE`, `HAVING` and `ON`.
//!
//! Leaves are comparisons, null checks, `IN`, `BETWEEN` and `EXISTS`.
//! [`VariadicPredicate`] is the only composite: it joins its children with
//! `AND` or `OR` and wraps itself in parentheses when it has more than one
//! child and is not marked toplevel.
//!
//! # Example
//! ```ignore
//! use sqkit::{and, or};
//!
//! let p = and([u.active.eq(true), or([u.role.eq("admin"), u.role.eq("owner")])]);
//! // u.active = ? AND (u.role = ? OR u.role = ?)    (when toplevel)
//! ```

use crate::error::{SqError, SqResult};
use crate::field::{Field, IntoField};
use crate::query::{Query, SqlStatement};
use crate::render::Renderer;

/// Comparison operator of a [`Predicate::Compare`] leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Like => "LIKE",
            CmpOp::NotLike => "NOT LIKE",
        }
    }
}

/// Operator joining the children of a [`VariadicPredicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogicalOp {
    #[default]
    And,
    Or,
}

impl LogicalOp {
    fn separator(self) -> &'static str {
        match self {
            LogicalOp::And => " AND ",
            LogicalOp::Or => " OR ",
        }
    }
}

/// Right-hand side of an `IN` predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum InSource {
    List(Vec<Field>),
    Query(Box<Query>),
}

/// A boolean expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `left op right`
    Compare { left: Field, op: CmpOp, right: Field },
    /// `field IS [NOT] NULL`
    Null { field: Field, negated: bool },
    /// `field [NOT] IN (...)`
    In {
        field: Field,
        source: InSource,
        negated: bool,
    },
    /// `field [NOT] BETWEEN low AND high`
    Between {
        field: Field,
        low: Field,
        high: Field,
        negated: bool,
    },
    /// `[NOT] EXISTS (subquery)`
    Exists { query: Box<Query>, negated: bool },
    /// `NOT (inner)`
    Not(Box<Predicate>),
    /// `AND` / `OR` group.
    Variadic(VariadicPredicate),
    /// Boolean-valued expression, see [`Field::expr`].
    Expr(Field),
}

impl Predicate {
    /// A boolean template with `?` operand slots.
    ///
    /// ```ignore
    /// Predicate::expr("? + 10 <= ?", [tens.field("n"), Field::raw("100")])
    /// ```
    pub fn expr<I>(format: impl Into<String>, operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoField,
    {
        Predicate::Expr(Field::expr(format, operands))
    }

    /// A raw boolean SQL fragment.
    pub fn raw(sql: impl Into<String>) -> Self {
        Predicate::Expr(Field::raw(sql))
    }

    /// Whether this predicate renders no text at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Predicate::Variadic(v) => v.is_empty(),
            Predicate::Not(inner) => inner.is_empty(),
            _ => false,
        }
    }

    pub fn append_sql(&self, r: &mut Renderer, excluded: &[&str]) -> SqResult<()> {
        match self {
            Predicate::Compare { left, op, right } => {
                left.append_sql(r, excluded)?;
                r.push_char(' ').push(op.as_str()).push_char(' ');
                right.append_sql(r, excluded)?;
            }
            Predicate::Null { field, negated } => {
                field.append_sql(r, excluded)?;
                r.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::In {
                field,
                source,
                negated,
            } => {
                if let InSource::List(values) = source
                    && values.is_empty()
                {
                    return Err(SqError::render(
                        format!("IN predicate on `{}`", field.label()),
                        "static value list is empty",
                    ));
                }
                field.append_sql(r, excluded)?;
                r.push(if *negated { " NOT IN (" } else { " IN (" });
                match source {
                    InSource::List(values) => {
                        for (i, value) in values.iter().enumerate() {
                            if i > 0 {
                                r.push(", ");
                            }
                            value.append_sql(r, excluded)?;
                        }
                    }
                    InSource::Query(query) => query.append_sql(r)?,
                }
                r.push_char(')');
            }
            Predicate::Between {
                field,
                low,
                high,
                negated,
            } => {
                field.append_sql(r, excluded)?;
                r.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                low.append_sql(r, excluded)?;
                r.push(" AND ");
                high.append_sql(r, excluded)?;
            }
            Predicate::Exists { query, negated } => {
                r.push(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
                query.append_sql(r)?;
                r.push_char(')');
            }
            Predicate::Not(inner) if inner.is_empty() => {}
            Predicate::Not(inner) => {
                r.push("NOT (");
                inner.append_sql(r, excluded)?;
                r.push_char(')');
            }
            Predicate::Variadic(v) => v.append_sql(r, excluded)?,
            Predicate::Expr(field) => field.append_sql(r, excluded)?,
        }
        Ok(())
    }
}

impl From<VariadicPredicate> for Predicate {
    fn from(v: VariadicPredicate) -> Self {
        Predicate::Variadic(v)
    }
}

/// An ordered group of predicates joined by one logical operator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariadicPredicate {
    pub op: LogicalOp,
    pub predicates: Vec<Predicate>,
    /// Outermost clause in its context; never parenthesized.
    pub toplevel: bool,
}

impl VariadicPredicate {
    pub fn new(op: LogicalOp, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Self {
            op,
            predicates: predicates.into_iter().collect(),
            toplevel: false,
        }
    }

    /// Return a copy marked as toplevel.
    pub fn toplevel(mut self) -> Self {
        self.toplevel = true;
        self
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    /// True when no child renders any text.
    pub fn is_empty(&self) -> bool {
        self.predicates.iter().all(Predicate::is_empty)
    }

    pub fn append_sql(&self, r: &mut Renderer, excluded: &[&str]) -> SqResult<()> {
        self.append_with(r, excluded, self.toplevel)
    }

    /// Render as the outermost clause of `WHERE`, `HAVING` or `ON`.
    pub(crate) fn append_toplevel_sql(&self, r: &mut Renderer, excluded: &[&str]) -> SqResult<()> {
        self.append_with(r, excluded, true)
    }

    fn append_with(&self, r: &mut Renderer, excluded: &[&str], toplevel: bool) -> SqResult<()> {
        let children: Vec<&Predicate> = self.predicates.iter().filter(|p| !p.is_empty()).collect();
        match children.as_slice() {
            [] => Ok(()),
            // a lone child takes over this group's position
            [Predicate::Variadic(only)] => only.append_with(r, excluded, toplevel),
            [only] => only.append_sql(r, excluded),
            many => {
                if !toplevel {
                    r.push_char('(');
                }
                for (i, child) in many.iter().enumerate() {
                    if i > 0 {
                        r.push(self.op.separator());
                    }
                    child.append_sql(r, excluded)?;
                }
                if !toplevel {
                    r.push_char(')');
                }
                Ok(())
            }
        }
    }
}

/// All of `predicates`.
pub fn and(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::Variadic(VariadicPredicate::new(LogicalOp::And, predicates))
}

/// Any of `predicates`.
pub fn or(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::Variadic(VariadicPredicate::new(LogicalOp::Or, predicates))
}

pub fn not(predicate: Predicate) -> Predicate {
    Predicate::Not(Box::new(predicate))
}

pub fn exists(query: impl Into<Query>) -> Predicate {
    Predicate::Exists {
        query: Box::new(query.into()),
        negated: false,
    }
}

pub fn not_exists(query: impl Into<Query>) -> Predicate {
    Predicate::Exists {
        query: Box::new(query.into()),
        negated: true,
    }
}

impl Field {
    fn compare(&self, op: CmpOp, rhs: impl IntoField) -> Predicate {
        Predicate::Compare {
            left: self.clone(),
            op,
            right: rhs.into_field(),
        }
    }

    pub fn eq(&self, rhs: impl IntoField) -> Predicate {
        self.compare(CmpOp::Eq, rhs)
    }

    pub fn ne(&self, rhs: impl IntoField) -> Predicate {
        self.compare(CmpOp::Ne, rhs)
    }

    pub fn lt(&self, rhs: impl IntoField) -> Predicate {
        self.compare(CmpOp::Lt, rhs)
    }

    pub fn le(&self, rhs: impl IntoField) -> Predicate {
        self.compare(CmpOp::Le, rhs)
    }

    pub fn gt(&self, rhs: impl IntoField) -> Predicate {
        self.compare(CmpOp::Gt, rhs)
    }

    pub fn ge(&self, rhs: impl IntoField) -> Predicate {
        self.compare(CmpOp::Ge, rhs)
    }

    pub fn like(&self, pattern: impl IntoField) -> Predicate {
        self.compare(CmpOp::Like, pattern)
    }

    pub fn not_like(&self, pattern: impl IntoField) -> Predicate {
        self.compare(CmpOp::NotLike, pattern)
    }

    pub fn is_null(&self) -> Predicate {
        Predicate::Null {
            field: self.clone(),
            negated: false,
        }
    }

    pub fn is_not_null(&self) -> Predicate {
        Predicate::Null {
            field: self.clone(),
            negated: true,
        }
    }

    /// `field IN (?, ?, ...)`. An empty list fails at render time.
    pub fn in_list<I>(&self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: IntoField,
    {
        Predicate::In {
            field: self.clone(),
            source: InSource::List(values.into_iter().map(IntoField::into_field).collect()),
            negated: false,
        }
    }

    pub fn not_in_list<I>(&self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: IntoField,
    {
        Predicate::In {
            field: self.clone(),
            source: InSource::List(values.into_iter().map(IntoField::into_field).collect()),
            negated: true,
        }
    }

    /// `field IN (subquery)`
    pub fn in_query(&self, query: impl Into<Query>) -> Predicate {
        Predicate::In {
            field: self.clone(),
            source: InSource::Query(Box::new(query.into())),
            negated: false,
        }
    }

    pub fn not_in_query(&self, query: impl Into<Query>) -> Predicate {
        Predicate::In {
            field: self.clone(),
            source: InSource::Query(Box::new(query.into())),
            negated: true,
        }
    }

    pub fn between(&self, low: impl IntoField, high: impl IntoField) -> Predicate {
        Predicate::Between {
            field: self.clone(),
            low: low.into_field(),
            high: high.into_field(),
            negated: false,
        }
    }

    pub fn not_between(&self, low: impl IntoField, high: impl IntoField) -> Predicate {
        Predicate::Between {
            field: self.clone(),
            low: low.into_field(),
            high: high.into_field(),
            negated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::field::{FieldType, TableInfo};
    use crate::value::Value;

    fn u() -> (Field, Field, Field) {
        let t = TableInfo::new("users").with_alias("u");
        (
            Field::new(&t, "user_id", FieldType::Number),
            Field::new(&t, "role", FieldType::String),
            Field::new(&t, "deleted_at", FieldType::Time),
        )
    }

    fn render(p: &Predicate, dialect: Dialect) -> (String, Vec<Value>) {
        let mut r = Renderer::new(dialect);
        p.append_sql(&mut r, &[]).unwrap();
        let built = r.finish();
        (built.sql, built.args)
    }

    #[test]
    fn comparison_binds_value() {
        let (id, _, _) = u();
        let (sql, args) = render(&id.ge(10), Dialect::Postgres);
        assert_eq!(sql, "u.user_id >= $1");
        assert_eq!(args, vec![Value::Int(10)]);
    }

    #[test]
    fn null_checks_take_no_argument() {
        let (_, _, deleted) = u();
        let (sql, args) = render(&deleted.is_null(), Dialect::Sqlite);
        assert_eq!(sql, "u.deleted_at IS NULL");
        assert!(args.is_empty());
        assert_eq!(render(&deleted.is_not_null(), Dialect::Sqlite).0, "u.deleted_at IS NOT NULL");
    }

    #[test]
    fn nested_group_is_parenthesized() {
        let (id, role, _) = u();
        let p = VariadicPredicate::new(
            LogicalOp::And,
            [id.eq(1), or([role.eq("admin"), role.eq("owner")])],
        )
        .toplevel();
        let (sql, args) = render(&p.into(), Dialect::Postgres);
        assert_eq!(sql, "u.user_id = $1 AND (u.role = $2 OR u.role = $3)");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn non_toplevel_group_is_parenthesized() {
        let (id, role, _) = u();
        let (sql, _) = render(&and([id.eq(1), role.eq("x")]), Dialect::Sqlite);
        assert_eq!(sql, "(u.user_id = ? AND u.role = ?)");
    }

    #[test]
    fn single_child_group_is_transparent() {
        let (id, _, _) = u();
        let (sql, _) = render(&and([or([id.eq(1)])]), Dialect::Sqlite);
        assert_eq!(sql, "u.user_id = ?");
    }

    #[test]
    fn empty_children_are_skipped() {
        let (id, role, _) = u();
        let p = and([and([]), id.eq(1), or([]), role.eq("a")]);
        assert_eq!(render(&p, Dialect::Sqlite).0, "(u.user_id = ? AND u.role = ?)");
        assert!(and([and([]), or([])]).is_empty());
    }

    #[test]
    fn lone_group_inherits_toplevel() {
        let (id, role, _) = u();
        let p = VariadicPredicate::new(LogicalOp::And, [or([id.eq(1), role.eq("a")])]);
        let mut r = Renderer::new(Dialect::Sqlite);
        p.append_toplevel_sql(&mut r, &[]).unwrap();
        assert_eq!(r.sql(), "u.user_id = ? OR u.role = ?");
        assert_eq!(
            render(&p.into(), Dialect::Sqlite).0,
            "(u.user_id = ? OR u.role = ?)"
        );
    }

    #[test]
    fn negated_empty_group_renders_nothing() {
        let (id, _, _) = u();
        assert!(not(and([])).is_empty());
        assert!(not(not(or([]))).is_empty());
        let p = and([not(and([])), id.eq(1)]);
        assert_eq!(render(&p, Dialect::Sqlite).0, "u.user_id = ?");
    }

    #[test]
    fn in_list_renders_placeholders() {
        let (id, _, _) = u();
        let (sql, args) = render(&id.in_list([1, 2, 3]), Dialect::Postgres);
        assert_eq!(sql, "u.user_id IN ($1, $2, $3)");
        assert_eq!(args, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn empty_in_list_is_render_error() {
        let (id, _, _) = u();
        let mut r = Renderer::new(Dialect::Sqlite);
        let err = id.in_list(Vec::<i64>::new()).append_sql(&mut r, &[]).unwrap_err();
        assert!(err.is_render());
        assert!(err.to_string().contains("u.user_id"));
    }

    #[test]
    fn between_and_not() {
        let (id, _, _) = u();
        let (sql, args) = render(&not(id.between(1, 9)), Dialect::Sqlite);
        assert_eq!(sql, "NOT (u.user_id BETWEEN ? AND ?)");
        assert_eq!(args, vec![Value::Int(1), Value::Int(9)]);
    }

    #[test]
    fn field_to_field_comparison() {
        let (id, role, _) = u();
        let (sql, args) = render(&id.ne(&role), Dialect::Sqlite);
        assert_eq!(sql, "u.user_id <> u.role");
        assert!(args.is_empty());
    }

    #[test]
    fn expr_predicate() {
        let (id, _, _) = u();
        let (sql, args) = render(&Predicate::expr("? % ? = 0", [id, Field::value(2)]), Dialect::Sqlite);
        assert_eq!(sql, "u.user_id % ? = 0");
        assert_eq!(args, vec![Value::Int(2)]);
    }
}
