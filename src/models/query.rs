//! Query-related data models.
//!
//! This module defines bind parameter values, rendered queries and the
//! outcome of running one.

use crate::models::ResultTable;
use serde::{Deserialize, Serialize};

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for QueryParam {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl std::fmt::Display for QueryParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "'{v}'"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Whether a statement produces a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// SELECT, SHOW, PRAGMA, EXPLAIN ...
    Query,
    /// DML, DDL, PL/SQL blocks; reports affected rows
    Command,
}

/// A query rendered for one dialect, ready to execute.
///
/// `sql` keeps `:name` markers for drivers with named binds (Oracle);
/// `positional_sql` replaces each marker with `?` and `positional_params`
/// repeats values in occurrence order (MySQL, SQLite).
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub binds: Vec<(String, QueryParam)>,
    pub positional_sql: String,
    pub positional_params: Vec<QueryParam>,
    pub kind: StatementKind,
    /// Query to run after `sql` on the same connection (explain plan display).
    pub follow_up: Option<String>,
}

impl BoundQuery {
    /// Look up a named bind value.
    pub fn bind_value(&self, name: &str) -> Option<&QueryParam> {
        self.binds
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn has_binds(&self) -> bool {
        !self.binds.is_empty()
    }

    /// Bind names, in first-appearance order.
    pub fn bind_names(&self) -> Vec<&str> {
        self.binds.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Same query with a different statement kind.
    pub fn with_kind(&self, kind: StatementKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    /// A plain query with no parameters.
    pub fn raw(sql: impl Into<String>, kind: StatementKind) -> Self {
        let sql = sql.into();
        Self {
            positional_sql: sql.clone(),
            sql,
            binds: Vec::new(),
            positional_params: Vec::new(),
            kind,
            follow_up: None,
        }
    }
}

/// What executing a bound query produced.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// A result set, possibly with zero rows.
    Rows(ResultTable),
    /// A command with no result set.
    Done { rows_affected: u64 },
}

impl QueryOutcome {
    pub fn into_table(self) -> Option<ResultTable> {
        match self {
            Self::Rows(table) => Some(table),
            Self::Done { .. } => None,
        }
    }

    /// The result set, or an empty table for commands.
    pub fn into_rows(self) -> ResultTable {
        self.into_table().unwrap_or_default()
    }

    pub fn rows_affected(&self) -> u64 {
        match self {
            Self::Rows(table) => table.row_count() as u64,
            Self::Done { rows_affected } => *rows_affected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_display() {
        assert_eq!(QueryParam::Null.to_string(), "NULL");
        assert_eq!(QueryParam::from("abc").to_string(), "'abc'");
        assert_eq!(QueryParam::from(42).to_string(), "42");
    }

    #[test]
    fn test_bytes_serialize_as_base64() {
        let json = serde_json::to_string(&QueryParam::Bytes(vec![1, 2, 3])).unwrap();
        assert_eq!(json, "\"AQID\"");
    }

    #[test]
    fn test_raw_bound_query() {
        let q = BoundQuery::raw("SELECT 1", StatementKind::Query);
        assert_eq!(q.positional_sql, "SELECT 1");
        assert!(!q.has_binds());
        assert!(q.bind_value("x").is_none());
    }
}
