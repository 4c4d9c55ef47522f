//! SQL identifier emission.
//!
//! Identifiers come from the table/field catalog and are written bare when they
//! are plain (`[A-Za-z_][A-Za-z0-9_]*`). Anything else is quoted with the
//! dialect's quote character, doubling embedded quotes.
//!
//! # Example
//! ```ignore
//! use sqkit::{Dialect, ident::write_ident};
//!
//! let mut out = String::new();
//! write_ident(&mut out, Dialect::Postgres, "UserTable")?;   // UserTable
//! write_ident(&mut out, Dialect::MySql, "order items")?;     // `order items`
//! # Ok::<(), sqkit::SqError>(())
//! ```

use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};

/// Whether `name` can be written without quotes.
pub fn is_plain(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Append one identifier part, quoting it if needed.
pub fn write_ident(out: &mut String, dialect: Dialect, name: &str) -> SqResult<()> {
    if name.is_empty() {
        return Err(SqError::validation("Identifier cannot be empty"));
    }
    if name.contains('\0') {
        return Err(SqError::validation(
            "Identifier cannot contain NUL character",
        ));
    }
    if is_plain(name) {
        out.push_str(name);
        return Ok(());
    }
    let quote = dialect.quote_char();
    out.reserve(name.len() + 2);
    out.push(quote);
    for ch in name.chars() {
        if ch == quote {
            out.push(quote);
        }
        out.push(ch);
    }
    out.push(quote);
    Ok(())
}

/// Quote a single identifier into a new string.
pub fn quote_ident(dialect: Dialect, name: &str) -> SqResult<String> {
    let mut out = String::with_capacity(name.len());
    write_ident(&mut out, dialect, name)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_simple() {
        assert_eq!(quote_ident(Dialect::Sqlite, "users").unwrap(), "users");
    }

    #[test]
    fn ident_with_digits_and_underscore() {
        assert_eq!(quote_ident(Dialect::Postgres, "_col_2").unwrap(), "_col_2");
    }

    #[test]
    fn ident_space_is_quoted() {
        assert_eq!(
            quote_ident(Dialect::Postgres, "my table").unwrap(),
            r#""my table""#
        );
    }

    #[test]
    fn ident_mysql_uses_backticks() {
        assert_eq!(quote_ident(Dialect::MySql, "my table").unwrap(), "`my table`");
    }

    #[test]
    fn ident_quote_is_doubled() {
        assert_eq!(
            quote_ident(Dialect::Sqlite, r#"has"quote"#).unwrap(),
            r#""has""quote""#
        );
    }

    #[test]
    fn ident_start_digit_is_quoted() {
        assert_eq!(quote_ident(Dialect::Sqlite, "1table").unwrap(), r#""1table""#);
    }

    #[test]
    fn ident_rejects_empty() {
        assert!(quote_ident(Dialect::Sqlite, "").is_err());
    }

    #[test]
    fn ident_rejects_nul() {
        assert!(quote_ident(Dialect::Sqlite, "a\0b").is_err());
    }
}
