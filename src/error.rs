//! Error types for the DBA shell.
//!
//! All fallible operations return [`DbResult`]. Template and binder errors are
//! raised before anything reaches a database; backend errors keep the driver's
//! message and SQL state.

use crate::models::{Dialect, Operation};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Unknown alias '{alias}' in {path}")]
    AliasNotFound { alias: String, path: String },

    #[error("Unsupported database backend: {backend}")]
    UnsupportedDialect { backend: String },

    #[error("{operation} is not available for {dialect}")]
    UnsupportedOperation {
        operation: Operation,
        dialect: Dialect,
    },

    #[error("Invalid aggregate '{spec}': expected one of count, sum, avg, min, max, count_distinct")]
    InvalidAggregateSpec { spec: String },

    #[error("{dialect} error: {message}")]
    Backend {
        dialect: Dialect,
        message: String,
        /// e.g., "42S02" for unknown table on MySQL
        sql_state: Option<String>,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Transaction error: {message}")]
    Transaction { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Shell usage text from the command parser, help included.
    #[error("{text}")]
    Usage { text: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Query template error: {message}")]
    Template { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create an alias lookup error.
    pub fn alias_not_found(alias: impl Into<String>, path: impl Into<String>) -> Self {
        Self::AliasNotFound {
            alias: alias.into(),
            path: path.into(),
        }
    }

    pub fn unsupported_dialect(backend: impl Into<String>) -> Self {
        Self::UnsupportedDialect {
            backend: backend.into(),
        }
    }

    pub fn unsupported_operation(operation: Operation, dialect: Dialect) -> Self {
        Self::UnsupportedOperation { operation, dialect }
    }

    pub fn invalid_aggregate(spec: impl Into<String>) -> Self {
        Self::InvalidAggregateSpec { spec: spec.into() }
    }

    /// Create a backend error with optional SQL state.
    pub fn backend(dialect: Dialect, message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Backend {
            dialect,
            message: message.into(),
            sql_state,
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn usage(text: impl Into<String>) -> Self {
        Self::Usage { text: text.into() }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::AliasNotFound { .. } => Some("Run 'aliases' to list the configured aliases"),
            Self::UnsupportedOperation { .. } => {
                Some("This lookup has no equivalent in the connected database")
            }
            Self::Transaction { .. } => Some("Use 'begin' to open a transaction first"),
            _ => None,
        }
    }

    /// Map a sqlx error, attaching the dialect of the connection it came from.
    pub fn from_sqlx(dialect: Dialect, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::backend(dialect, db_err.message(), code)
            }
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the alias host, port and database settings",
            ),
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out acquiring a connection",
                "Check database server status or raise --acquire-timeout",
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect with 'use'")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            other => DbError::backend(dialect, other.to_string(), None),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
