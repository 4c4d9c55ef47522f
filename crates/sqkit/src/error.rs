//! Error types for sqkit

use std::panic::Location;
use thiserror::Error;

use crate::query::StatementId;

/// Result type alias for sqkit operations
pub type SqResult<T> = Result<T, SqError>;

/// Error types for query construction, execution and row scanning
#[derive(Debug, Error)]
pub enum SqError {
    /// The query tree cannot be rendered as valid SQL.
    ///
    /// `node` identifies the offending node, e.g. ``recursive CTE `tens` ``.
    /// The tree itself is left untouched and can be rendered again once fixed.
    #[error("Render error in {node}: {message}")]
    Render { node: String, message: String },

    /// A statement failed while executing against the database.
    ///
    /// Carries the structural identity of the statement and the call site that
    /// issued it, never the SQL text or the bound values.
    #[error("{statement} failed at {site}: {source}")]
    Execute {
        statement: StatementId,
        site: &'static Location<'static>,
        #[source]
        source: Box<SqError>,
    },

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/scan error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl SqError {
    /// Create a render error for the given node
    pub fn render(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wrap a database-level error with the statement identity and call site.
    pub fn execute(
        statement: StatementId,
        site: &'static Location<'static>,
        source: SqError,
    ) -> Self {
        Self::Execute {
            statement,
            site,
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through `Execute` wrappers.
    pub fn root(&self) -> &SqError {
        match self {
            Self::Execute { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this is a render (construction) error
    pub fn is_render(&self) -> bool {
        matches!(self.root(), Self::Render { .. })
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self.root(), Self::UniqueViolation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Timeout(_))
    }

    /// Parse a tokio_postgres error into a more specific SqError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}
