//! Oracle session over the blocking `oracle` driver.
//!
//! The driver opens sessions with autocommit off, so every statement runs in
//! an implicit transaction until [`OracleSession::commit`] or
//! [`OracleSession::rollback`].

use crate::db::normalize::normalize;
use crate::error::{DbError, DbResult};
use crate::models::{BoundQuery, Dialect, QueryOutcome, QueryParam, StatementKind, Value};
use oracle::sql_type::{OracleType, ToSql};
use oracle::{Connection, Row, Statement};
use tracing::debug;

pub struct OracleSession {
    conn: Connection,
}

impl OracleSession {
    /// `connect_string` is `//host:port/service`.
    pub fn connect(username: &str, password: &str, connect_string: &str) -> DbResult<Self> {
        let conn = Connection::connect(username, password, connect_string).map_err(|e| {
            DbError::connection(
                format!("Failed to connect to Oracle at {connect_string}: {e}"),
                "Check host, port and service name in the alias file",
            )
        })?;
        Ok(Self { conn })
    }

    pub fn run(&self, query: &BoundQuery) -> DbResult<QueryOutcome> {
        debug!(
            dialect = "oracle",
            sql = %query.sql,
            binds = query.binds.len(),
            kind = ?query.kind,
            "Executing query"
        );

        let mut stmt = self.conn.statement(&query.sql).build().map_err(backend_error)?;
        for (name, value) in &query.binds {
            bind(&mut stmt, name, value)?;
        }

        // The driver knows whether the text is a SELECT; trust it over the template
        if stmt.is_query() {
            return fetch(&mut stmt);
        }
        if query.kind == StatementKind::Query {
            debug!("Template declared a query but the statement returns no rows");
        }
        stmt.execute(&[]).map_err(backend_error)?;
        let rows_affected = stmt.row_count().map_err(backend_error)?;

        match &query.follow_up {
            Some(sql) => {
                let mut follow = self.conn.statement(sql).build().map_err(backend_error)?;
                fetch(&mut follow)
            }
            None => Ok(QueryOutcome::Done { rows_affected }),
        }
    }

    pub fn commit(&self) -> DbResult<()> {
        self.conn.commit().map_err(backend_error)
    }

    pub fn rollback(&self) -> DbResult<()> {
        self.conn.rollback().map_err(backend_error)
    }

    pub fn close(&self) {
        if let Err(e) = self.conn.close() {
            debug!(error = %e, "Oracle session close failed");
        }
    }
}

fn backend_error(err: oracle::Error) -> DbError {
    DbError::backend(Dialect::Oracle, err.to_string(), None)
}

fn bind(stmt: &mut Statement, name: &str, value: &QueryParam) -> DbResult<()> {
    let result = match value {
        QueryParam::Null => stmt.bind(name, &None::<String>),
        // BOOLEAN is PL/SQL only before 23c
        QueryParam::Bool(v) => stmt.bind(name, &i64::from(*v)),
        QueryParam::Int(v) => stmt.bind(name, v as &dyn ToSql),
        QueryParam::Float(v) => stmt.bind(name, v as &dyn ToSql),
        QueryParam::String(v) => stmt.bind(name, v as &dyn ToSql),
        QueryParam::Bytes(v) => stmt.bind(name, v as &dyn ToSql),
    };
    result.map_err(backend_error)
}

fn fetch(stmt: &mut Statement) -> DbResult<QueryOutcome> {
    let rows = stmt.query(&[]).map_err(backend_error)?;
    let info: Vec<(String, OracleType)> = rows
        .column_info()
        .iter()
        .map(|col| (col.name().to_string(), col.oracle_type().clone()))
        .collect();

    let mut values = Vec::new();
    for row in rows {
        let row = row.map_err(backend_error)?;
        values.push(decode_row(&row, &info)?);
    }
    let columns = info.into_iter().map(|(name, _)| name).collect();
    Ok(QueryOutcome::Rows(normalize(columns, values)?))
}

fn decode_row(row: &Row, info: &[(String, OracleType)]) -> DbResult<Vec<Value>> {
    info.iter()
        .enumerate()
        .map(|(idx, (_, ty))| decode_column(row, idx, ty))
        .collect()
}

fn decode_column(row: &Row, idx: usize, ty: &OracleType) -> DbResult<Value> {
    let value = match ty {
        OracleType::Number(..) | OracleType::BinaryFloat | OracleType::BinaryDouble => row
            .get::<usize, Option<String>>(idx)
            .map_err(backend_error)?
            .map(|s| parse_number(&s))
            .unwrap_or(Value::Null),
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => row
            .get::<usize, Option<Vec<u8>>>(idx)
            .map_err(backend_error)?
            .map(Value::Bytes)
            .unwrap_or(Value::Null),
        _ => row
            .get::<usize, Option<String>>(idx)
            .map_err(backend_error)?
            .map(Value::Text)
            .unwrap_or(Value::Null),
    };
    Ok(value)
}

// NUMBER without scale comes back as text; keep integers exact
fn parse_number(text: &str) -> Value {
    if let Ok(v) = text.parse::<i64>() {
        return Value::Int(v);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Value::Float(v),
        _ => Value::Text(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42"), Value::Int(42));
        assert_eq!(parse_number("1.5"), Value::Float(1.5));
        assert_eq!(
            parse_number("123456789012345678901234567890"),
            Value::Float(123456789012345678901234567890.0)
        );
    }
}
