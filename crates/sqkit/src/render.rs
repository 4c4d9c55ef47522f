//! Per-call rendering state.
//!
//! Query trees never hold rendering state. Every render call creates a fresh
//! [`Renderer`] which owns the output buffer, the argument list and the
//! named-placeholder map, and threads it down through the tree. Two threads can
//! therefore render the same tree at the same time, each with its own renderer.

use std::collections::HashMap;
use std::fmt::Write;

use crate::dialect::Dialect;
use crate::error::SqResult;
use crate::ident;
use crate::value::Value;

/// Scratch state for one render call.
#[derive(Debug)]
pub struct Renderer {
    dialect: Dialect,
    buf: String,
    args: Vec<Value>,
    /// Named argument -> placeholder number (numbered dialects only).
    named: HashMap<String, usize>,
}

impl Renderer {
    /// Create an empty renderer for `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            buf: String::with_capacity(256),
            args: Vec::new(),
            named: HashMap::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// SQL written so far.
    pub fn sql(&self) -> &str {
        &self.buf
    }

    /// Arguments collected so far, in placeholder order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Append raw SQL text.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.buf.push_str(sql);
        self
    }

    pub(crate) fn push_char(&mut self, ch: char) -> &mut Self {
        self.buf.push(ch);
        self
    }

    /// Append an identifier, quoting it for the dialect when needed.
    pub fn push_ident(&mut self, name: &str) -> SqResult<&mut Self> {
        ident::write_ident(&mut self.buf, self.dialect, name)?;
        Ok(self)
    }

    /// Append a placeholder and bind `value` to it.
    pub fn push_arg(&mut self, value: Value) -> &mut Self {
        self.args.push(value);
        if self.dialect.numbered_placeholders() {
            let _ = write!(self.buf, "${}", self.args.len());
        } else {
            self.buf.push('?');
        }
        self
    }

    /// Append a placeholder for a named argument.
    ///
    /// In numbered dialects the first occurrence of `name` binds `value` and
    /// allocates a number; later occurrences reuse that number without binding
    /// again. Positional dialects bind at every occurrence.
    pub fn push_named_arg(&mut self, name: &str, value: &Value) -> &mut Self {
        if !self.dialect.numbered_placeholders() {
            return self.push_arg(value.clone());
        }
        let number = match self.named.get(name) {
            Some(&n) => n,
            None => {
                self.args.push(value.clone());
                let n = self.args.len();
                self.named.insert(name.to_string(), n);
                n
            }
        };
        let _ = write!(self.buf, "${number}");
        self
    }

    /// Consume the renderer and return the finished statement.
    pub fn finish(self) -> BuiltQuery {
        BuiltQuery {
            sql: self.buf,
            args: self.args,
        }
    }
}

/// The result of rendering a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

impl BuiltQuery {
    /// Parameter refs compatible with `tokio-postgres`.
    pub fn params_ref(&self) -> Vec<&(dyn tokio_postgres::types::ToSql + Sync)> {
        crate::client::params_ref(&self.args)
    }
}
