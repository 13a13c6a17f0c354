//! SQL dialects understood by the query layer.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Oracle,
    /// Includes MariaDB
    MySql,
    SQLite,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::Oracle, Dialect::MySql, Dialect::SQLite];

    /// Determine the dialect from a backend identifier.
    ///
    /// Accepts bare names (`oracle`), driver-qualified names
    /// (`mysql+mysqlconnector`) and connection URLs (`sqlite:data.db`).
    pub fn resolve(backend: &str) -> DbResult<Self> {
        let lower = backend.trim().to_ascii_lowercase();
        if lower.starts_with("oracle") {
            Ok(Self::Oracle)
        } else if lower.starts_with("mysql") || lower.starts_with("mariadb") {
            Ok(Self::MySql)
        } else if lower.starts_with("sqlite") {
            Ok(Self::SQLite)
        } else {
            Err(DbError::unsupported_dialect(backend))
        }
    }

    /// Get the display name for this dialect.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Oracle => "Oracle",
            Self::MySql => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Get the default port for this dialect.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Oracle => Some(1521),
            Self::MySql => Some(3306),
            Self::SQLite => None,
        }
    }

    /// Case folding applied to unquoted identifiers interpolated into SQL.
    pub fn fold_identifier(&self, ident: &str) -> String {
        match self {
            Self::Oracle => ident.to_ascii_uppercase(),
            Self::SQLite => ident.to_ascii_lowercase(),
            Self::MySql => ident.to_string(),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
