//! SQL dialects.
//!
//! A [`Dialect`] decides the placeholder style, the identifier quote character
//! and a handful of keyword substitutions (upsert phrasing, `RETURNING`).

use crate::error::{SqError, SqResult};
use std::fmt;
use std::str::FromStr;

/// The SQL dialect a statement is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// SQLite: `?` placeholders, `"` quoting.
    #[default]
    Sqlite,
    /// PostgreSQL: `$n` placeholders, `"` quoting.
    Postgres,
    /// MySQL: `?` placeholders, `` ` `` quoting.
    MySql,
}

impl Dialect {
    /// Dialect name as accepted by [`Dialect::from_str`].
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
        }
    }

    /// Whether placeholders are numbered (`$1`, `$2`, ...) rather than positional `?`.
    pub fn numbered_placeholders(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Character used to quote identifiers.
    pub fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Sqlite | Dialect::Postgres => '"',
        }
    }

    /// Whether `INSERT/UPDATE/DELETE ... RETURNING` is available.
    pub fn supports_returning(self) -> bool {
        !matches!(self, Dialect::MySql)
    }

    /// Whether `ON CONFLICT (...) DO ...` is the upsert phrasing.
    ///
    /// MySQL uses `INSERT IGNORE` / `ON DUPLICATE KEY UPDATE` instead.
    pub fn supports_on_conflict(self) -> bool {
        !matches!(self, Dialect::MySql)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = SqError;

    fn from_str(s: &str) -> SqResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            other => Err(SqError::validation(format!("unknown SQL dialect '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dialect_names() {
        assert_eq!("".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!("sqlite3".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("mysql".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn placeholder_styles() {
        assert!(Dialect::Postgres.numbered_placeholders());
        assert!(!Dialect::Sqlite.numbered_placeholders());
        assert!(!Dialect::MySql.numbered_placeholders());
    }
}
