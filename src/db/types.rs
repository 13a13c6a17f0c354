//! Row decoding into [`Value`]s.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! SQLite is dynamically typed, so its decoder classifies by the storage
//! class of each value rather than the declared column type.

use crate::models::{Dialect, Value};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Temporal,
    Json,
    Null,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, dialect: Dialect) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower == "null" {
        return TypeCategory::Null;
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") || lower == "number" {
        // SQLite's NUMERIC is actually a float
        if dialect == Dialect::SQLite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    // MySQL reports BOOLEAN columns as TINYINT(1); only explicit names count
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower.starts_with("date") || lower.starts_with("time") || lower == "year" {
        return TypeCategory::Temporal;
    }

    if lower == "json" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "raw" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower.contains("clob") || lower == "enum" || lower == "set" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Wrapper type for raw DECIMAL values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Bytes as text when they are valid UTF-8.
pub fn bytes_to_value(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(s) => Value::Text(s),
        Err(e) => Value::Bytes(e.into_bytes()),
    }
}

/// Column names of a row, in order.
pub fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

// =============================================================================
// Row Conversion Trait
// =============================================================================

/// Trait for converting database rows to cell values.
pub trait RowToValues {
    fn to_values(&self) -> Vec<Value>;
}

impl RowToValues for MySqlRow {
    fn to_values(&self) -> Vec<Value> {
        (0..self.columns().len())
            .map(|idx| mysql::decode_column(self, idx))
            .collect()
    }
}

impl RowToValues for SqliteRow {
    fn to_values(&self) -> Vec<Value> {
        (0..self.columns().len())
            .map(|idx| sqlite::decode_column(self, idx))
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &MySqlRow, idx: usize) -> Value {
        if row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true) {
            return Value::Null;
        }
        let type_name = row.columns()[idx].type_info().name();
        match categorize_type(type_name, Dialect::MySql) {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> Value {
        match row.try_get::<RawDecimal, _>(idx) {
            Ok(v) => Value::Text(v.0),
            Err(e) => {
                tracing::error!("Failed to decode DECIMAL: {:?}", e);
                decode_text(row, idx)
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<i8, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Value::Int(v);
        }
        if let Ok(v) = row.try_get::<u8, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(v) = row.try_get::<u16, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(v) = row.try_get::<u32, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(v) = row.try_get::<u64, _>(idx) {
            return i64::try_from(v)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(v.to_string()));
        }
        decode_text(row, idx)
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<bool, _>(idx)
            .map(Value::Bool)
            .unwrap_or_else(|_| decode_integer(row, idx))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Value::Float(v);
        }
        if let Ok(v) = row.try_get::<f32, _>(idx) {
            return Value::Float(v.into());
        }
        decode_text(row, idx)
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return Value::Text(v.format("%Y-%m-%d %H:%M:%S").to_string());
        }
        if let Ok(v) = row.try_get::<DateTime<Utc>, _>(idx) {
            return Value::Text(v.format("%Y-%m-%d %H:%M:%S").to_string());
        }
        if let Ok(v) = row.try_get::<NaiveDate, _>(idx) {
            return Value::Text(v.to_string());
        }
        if let Ok(v) = row.try_get::<NaiveTime, _>(idx) {
            return Value::Text(v.to_string());
        }
        decode_text(row, idx)
    }

    fn decode_binary(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Vec<u8>, _>(idx)
            .map(bytes_to_value)
            .unwrap_or(Value::Null)
    }

    // information_schema reports some text columns as binary collations
    fn decode_text(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return Value::Text(v);
        }
        if let Ok(v) = row.try_get_unchecked::<Vec<u8>, _>(idx) {
            return bytes_to_value(v);
        }
        Value::Null
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize) -> Value {
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Ok(raw) => raw.type_info().name().to_string(),
            Err(_) => return Value::Null,
        };
        match categorize_type(&storage, Dialect::SQLite) {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> Value {
        row.try_get_unchecked::<i64, _>(idx)
            .map(Value::Int)
            .unwrap_or(Value::Null)
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> Value {
        row.try_get_unchecked::<f64, _>(idx)
            .map(Value::Float)
            .unwrap_or(Value::Null)
    }

    fn decode_binary(row: &SqliteRow, idx: usize) -> Value {
        row.try_get_unchecked::<Vec<u8>, _>(idx)
            .map(bytes_to_value)
            .unwrap_or(Value::Null)
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> Value {
        row.try_get_unchecked::<String, _>(idx)
            .map(Value::Text)
            .unwrap_or(Value::Null)
    }
}
