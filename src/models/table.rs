//! Normalized tabular results.

use serde::Serialize;
use serde_json::Value as JsonValue;

/// A single cell value. `Null` is distinct from empty text and zero.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to JSON. Binary data is base64 encoded.
    pub fn to_json(&self) -> JsonValue {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::Number((*i).into()),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(f.to_string())),
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Bytes(b) => JsonValue::String(STANDARD.encode(b)),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => f.write_str(s),
                Err(_) => write!(f, "0x{}", b.iter().map(|x| format!("{x:02x}")).collect::<String>()),
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A result column: the unique machine name plus a human label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub label: String,
}

/// Ordered columns and fixed-arity rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Value at `row` for the named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Flip a table so each column becomes a (property, value...) row.
    ///
    /// Used to show wide single-row results vertically.
    pub fn transpose(&self) -> ResultTable {
        let mut columns = vec![Column {
            name: "property".to_string(),
            label: "Property".to_string(),
        }];
        for i in 0..self.rows.len() {
            let name = if self.rows.len() == 1 {
                "value".to_string()
            } else {
                format!("row_{}", i + 1)
            };
            let label = if self.rows.len() == 1 {
                "Value".to_string()
            } else {
                format!("Row {}", i + 1)
            };
            columns.push(Column { name, label });
        }

        let rows = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let mut row = vec![Value::Text(col.label.clone())];
                row.extend(self.rows.iter().map(|r| r[idx].clone()));
                row
            })
            .collect();

        ResultTable { columns, rows }
    }

    /// Rows as JSON objects keyed by machine name.
    pub fn to_json_rows(&self) -> Vec<serde_json::Map<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(col, value)| (col.name.clone(), value.to_json()))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultTable {
        ResultTable {
            columns: vec![
                Column {
                    name: "id".into(),
                    label: "Id".into(),
                },
                Column {
                    name: "table_name".into(),
                    label: "Table Name".into(),
                },
            ],
            rows: vec![vec![Value::Int(1), Value::from("orders")]],
        }
    }

    #[test]
    fn test_null_is_not_empty_text() {
        assert_ne!(Value::Null, Value::from(""));
        assert_ne!(Value::Null, Value::Int(0));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_transpose_single_row() {
        let t = sample().transpose();
        assert_eq!(t.column_names(), vec!["property", "value"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[1], vec![Value::from("Table Name"), Value::from("orders")]);
    }

    #[test]
    fn test_get_by_column_name() {
        let t = sample();
        assert_eq!(t.get(0, "TABLE_NAME"), Some(&Value::from("orders")));
        assert_eq!(t.get(1, "id"), None);
    }

    #[test]
    fn test_json_rows() {
        let rows = sample().to_json_rows();
        assert_eq!(rows[0]["id"], serde_json::json!(1));
        assert_eq!(rows[0]["table_name"], serde_json::json!("orders"));
    }
}
