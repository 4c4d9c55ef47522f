//! Table declarations.
//!
//! The [`table!`](crate::table) macro turns a fixed table description into a
//! struct of typed [`Field`](crate::Field)s bound to one alias:
//!
//! ```
//! sqkit::table! {
//!     /// Site users.
//!     pub struct Users("users") {
//!         user_id: Number,
//!         displayname: String,
//!         active: Boolean,
//!     }
//! }
//!
//! let u = Users::new("u");
//! assert_eq!(u.user_id.to_string(), "u.user_id");
//! assert_eq!(Users::NAME, "users");
//! ```

/// Declare a table struct with one [`Field`](crate::Field) per column.
///
/// Column types name [`FieldType`](crate::FieldType) variants. The struct
/// converts into both [`TableInfo`](crate::TableInfo) and
/// [`TableSource`](crate::TableSource), so `&t` works in `from`, joins and
/// the write builders.
#[macro_export]
macro_rules! table {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($table:literal) {
            $($column:ident : $ty:ident),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            pub info: $crate::TableInfo,
            $(pub $column: $crate::Field,)*
        }

        impl $name {
            /// Physical table name.
            pub const NAME: &'static str = $table;

            /// Bind the table to `alias`; an empty alias uses the table name.
            pub fn new(alias: &str) -> Self {
                let info = $crate::TableInfo::new(Self::NAME).with_alias(alias);
                Self {
                    $($column: $crate::Field::new(
                        &info,
                        stringify!($column),
                        $crate::FieldType::$ty,
                    ),)*
                    info,
                }
            }

            /// Every column, in declaration order.
            pub fn fields(&self) -> Vec<$crate::Field> {
                vec![$(self.$column.clone()),*]
            }
        }

        impl From<&$name> for $crate::TableInfo {
            fn from(table: &$name) -> Self {
                table.info.clone()
            }
        }

        impl From<&$name> for $crate::TableSource {
            fn from(table: &$name) -> Self {
                $crate::TableSource::Table(table.info.clone())
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::dialect::Dialect;
    use crate::field::FieldType;
    use crate::query::{SqlStatement, insert_into, select};

    crate::table! {
        struct Pages("pages") {
            page_id: Number,
            title: String,
            body: Blob,
        }
    }

    #[test]
    fn fields_are_bound_to_alias() {
        let p = Pages::new("p");
        assert_eq!(p.info.qualifier(), "p");
        assert_eq!(p.title.qualifier(), "p");
        assert_eq!(p.body.field_type(), FieldType::Blob);
        assert_eq!(p.fields().len(), 3);
    }

    #[test]
    fn empty_alias_uses_table_name() {
        let p = Pages::new("");
        assert_eq!(p.page_id.to_string(), "pages.page_id");
    }

    #[test]
    fn table_struct_is_a_source() {
        let p = Pages::new("p");
        let sql = select(p.fields())
            .from(&p)
            .to_sql(Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql, "SELECT p.page_id, p.title, p.body FROM pages AS p");

        let sql = insert_into(&p)
            .columns([&p.title])
            .values([Some("x")])
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(sql, "INSERT INTO pages AS p (title) VALUES ($1)");
    }
}
