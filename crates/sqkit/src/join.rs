//! Join clauses.

use crate::error::SqResult;
use crate::predicate::{LogicalOp, Predicate, VariadicPredicate};
use crate::render::Renderer;
use crate::table::TableSource;

/// Join keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    /// Caller-supplied keyword, e.g. `CROSS JOIN` or `LEFT JOIN LATERAL`.
    Custom(String),
}

impl JoinType {
    pub fn keyword(&self) -> &str {
        match self {
            JoinType::Inner => "JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
            JoinType::Custom(k) if k.trim().is_empty() => "JOIN",
            JoinType::Custom(k) => k.trim(),
        }
    }
}

/// One `<KEYWORD> <table> [ON <predicate>]` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinTable {
    pub join_type: JoinType,
    pub table: TableSource,
    pub on: VariadicPredicate,
}

impl JoinTable {
    pub fn new(
        join_type: JoinType,
        table: impl Into<TableSource>,
        predicates: impl IntoIterator<Item = Predicate>,
    ) -> Self {
        Self {
            join_type,
            table: table.into(),
            on: VariadicPredicate::new(LogicalOp::And, predicates),
        }
    }

    /// `ON` is omitted when there are no predicates.
    pub fn append_sql(&self, r: &mut Renderer) -> SqResult<()> {
        r.push(self.join_type.keyword()).push_char(' ');
        self.table.append_sql(r)?;
        if !self.on.is_empty() {
            r.push(" ON ");
            self.on.append_toplevel_sql(r, &[])?;
        }
        Ok(())
    }
}

pub fn join(
    table: impl Into<TableSource>,
    predicates: impl IntoIterator<Item = Predicate>,
) -> JoinTable {
    JoinTable::new(JoinType::Inner, table, predicates)
}

pub fn left_join(
    table: impl Into<TableSource>,
    predicates: impl IntoIterator<Item = Predicate>,
) -> JoinTable {
    JoinTable::new(JoinType::Left, table, predicates)
}

pub fn right_join(
    table: impl Into<TableSource>,
    predicates: impl IntoIterator<Item = Predicate>,
) -> JoinTable {
    JoinTable::new(JoinType::Right, table, predicates)
}

pub fn full_join(
    table: impl Into<TableSource>,
    predicates: impl IntoIterator<Item = Predicate>,
) -> JoinTable {
    JoinTable::new(JoinType::Full, table, predicates)
}

pub fn custom_join(
    keyword: impl Into<String>,
    table: impl Into<TableSource>,
    predicates: impl IntoIterator<Item = Predicate>,
) -> JoinTable {
    JoinTable::new(JoinType::Custom(keyword.into()), table, predicates)
}

/// Write joins separated by single spaces, in declaration order.
pub(crate) fn append_joins_sql(joins: &[JoinTable], r: &mut Renderer) -> SqResult<()> {
    for (i, join) in joins.iter().enumerate() {
        if i > 0 {
            r.push_char(' ');
        }
        join.append_sql(r)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::field::{Field, FieldType, TableInfo};
    use crate::query::select;

    fn render(joins: &[JoinTable]) -> String {
        let mut r = Renderer::new(Dialect::Sqlite);
        append_joins_sql(joins, &mut r).unwrap();
        r.finish().sql
    }

    #[test]
    fn left_join_without_predicates_has_no_on() {
        let roles = TableInfo::new("roles").with_alias("r");
        assert_eq!(render(&[left_join(&roles, [])]), "LEFT JOIN roles AS r");
    }

    #[test]
    fn single_predicate_is_not_parenthesized() {
        let users = TableInfo::new("users").with_alias("u");
        let roles = TableInfo::new("roles").with_alias("r");
        let uid = Field::new(&users, "role_id", FieldType::Number);
        let rid = Field::new(&roles, "role_id", FieldType::Number);
        assert_eq!(
            render(&[left_join(&roles, [rid.eq(&uid)])]),
            "LEFT JOIN roles AS r ON r.role_id = u.role_id"
        );
    }

    #[test]
    fn several_predicates_form_toplevel_and() {
        let users = TableInfo::new("users").with_alias("u");
        let roles = TableInfo::new("roles").with_alias("r");
        let uid = Field::new(&users, "role_id", FieldType::Number);
        let rid = Field::new(&roles, "role_id", FieldType::Number);
        let active = Field::new(&roles, "active", FieldType::Boolean);
        assert_eq!(
            render(&[join(&roles, [rid.eq(&uid), active.eq(true)])]),
            "JOIN roles AS r ON r.role_id = u.role_id AND r.active = ?"
        );
    }

    #[test]
    fn joins_keep_declaration_order() {
        let a = TableInfo::new("a");
        let b = TableInfo::new("b");
        let c = TableInfo::new("c");
        let sql = render(&[
            right_join(&b, []),
            custom_join("CROSS JOIN", &c, []),
            full_join(&a, []),
        ]);
        assert_eq!(sql, "RIGHT JOIN b CROSS JOIN c FULL JOIN a");
    }

    #[test]
    fn subquery_join_is_parenthesized() {
        let orders = TableInfo::new("orders");
        let uid = Field::new(&orders, "user_id", FieldType::Number);
        let sq = select([&uid]).from(&orders).subquery("o");
        assert_eq!(
            render(&[join(&sq, [])]),
            "JOIN (SELECT orders.user_id FROM orders) AS o"
        );
    }
}
