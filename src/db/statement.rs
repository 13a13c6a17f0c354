//! Statement classification for free-form SQL.
//!
//! Decides whether user SQL returns rows, and refuses transaction control
//! statements, which the shell manages itself. Parsing uses
//! [sqlparser](https://docs.rs/sqlparser/); text it cannot parse (PL/SQL
//! blocks, vendor syntax) is classified by its leading keyword.

use crate::error::{DbError, DbResult};
use crate::models::{Dialect, StatementKind};
use sqlparser::ast::Statement;
use sqlparser::dialect::{self as sp, GenericDialect, MySqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

/// Keywords that start a row-returning statement.
const ROW_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "PRAGMA", "VALUES",
];

const TRANSACTION_KEYWORDS: &[&str] = &["BEGIN", "START", "COMMIT", "ROLLBACK", "END"];

fn parser_dialect(dialect: Dialect) -> Box<dyn sp::Dialect> {
    match dialect {
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::SQLite => Box::new(SQLiteDialect {}),
        Dialect::Oracle => Box::new(GenericDialect {}),
    }
}

/// Classify `sql` as a query or a command.
///
/// Returns `InvalidInput` for BEGIN/COMMIT/ROLLBACK, which must go through the
/// shell's transaction commands.
pub fn classify(sql: &str, dialect: Dialect) -> DbResult<StatementKind> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(DbError::invalid_input("SQL statement is empty"));
    }
    if is_plsql_block(trimmed) {
        return Ok(StatementKind::Command);
    }

    match Parser::parse_sql(parser_dialect(dialect).as_ref(), trimmed) {
        Ok(statements) => match statements.last() {
            Some(stmt) => classify_statement(stmt),
            None => Err(DbError::invalid_input("SQL statement is empty")),
        },
        Err(e) => {
            tracing::debug!(error = %e, "Falling back to keyword classification");
            classify_keyword(trimmed)
        }
    }
}

fn classify_statement(stmt: &Statement) -> DbResult<StatementKind> {
    let kind = match stmt {
        Statement::Query(_)
        | Statement::Explain { .. }
        | Statement::ExplainTable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowSchemas { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. }
        | Statement::Pragma { .. } => StatementKind::Query,

        Statement::StartTransaction { .. }
        | Statement::Commit { .. }
        | Statement::Rollback { .. } => return Err(transaction_control()),

        _ => StatementKind::Command,
    };
    Ok(kind)
}

fn classify_keyword(sql: &str) -> DbResult<StatementKind> {
    let first = sql
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .find(|w| !w.is_empty())
        .unwrap_or_default()
        .to_uppercase();

    if TRANSACTION_KEYWORDS.contains(&first.as_str()) {
        return Err(transaction_control());
    }
    if ROW_KEYWORDS.contains(&first.as_str()) {
        return Ok(StatementKind::Query);
    }
    Ok(StatementKind::Command)
}

// Anonymous PL/SQL blocks start with BEGIN too
fn is_plsql_block(sql: &str) -> bool {
    let upper = sql.to_uppercase();
    let starts = upper.starts_with("DECLARE") || upper.starts_with("BEGIN");
    starts
        && upper.split_whitespace().count() > 2
        && upper
            .trim_end()
            .trim_end_matches([';', '/'])
            .trim_end()
            .ends_with("END")
}

fn transaction_control() -> DbError {
    DbError::invalid_input(
        "Transaction control statements are not accepted as SQL. Use the begin, commit and rollback commands.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_query() {
        assert_eq!(
            classify("SELECT * FROM t WHERE id = :id", Dialect::SQLite).unwrap(),
            StatementKind::Query
        );
        assert_eq!(
            classify("  with x as (select 1) select * from x", Dialect::MySql).unwrap(),
            StatementKind::Query
        );
    }

    #[test]
    fn test_dml_is_command() {
        assert_eq!(
            classify("UPDATE t SET a = 1", Dialect::SQLite).unwrap(),
            StatementKind::Command
        );
        assert_eq!(
            classify("CREATE TABLE t (id INTEGER)", Dialect::MySql).unwrap(),
            StatementKind::Command
        );
    }

    #[test]
    fn test_pragma_and_show_are_queries() {
        assert_eq!(
            classify("PRAGMA table_info(orders)", Dialect::SQLite).unwrap(),
            StatementKind::Query
        );
        assert_eq!(
            classify("SHOW TABLES", Dialect::MySql).unwrap(),
            StatementKind::Query
        );
    }

    #[test]
    fn test_transaction_control_rejected() {
        assert!(matches!(
            classify("COMMIT", Dialect::SQLite),
            Err(DbError::InvalidInput { .. })
        ));
        assert!(matches!(
            classify("BEGIN TRANSACTION", Dialect::MySql),
            Err(DbError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_plsql_block_is_command() {
        let block = "BEGIN DBMS_STATS.GATHER_TABLE_STATS(USER, 'ORDERS'); END;";
        assert_eq!(
            classify(block, Dialect::Oracle).unwrap(),
            StatementKind::Command
        );
    }

    #[test]
    fn test_unparseable_select_falls_back_to_keyword() {
        let sql = "SELECT * FROM t@dblink CONNECT BY PRIOR id = parent_id";
        assert_eq!(classify(sql, Dialect::Oracle).unwrap(), StatementKind::Query);
    }

    #[test]
    fn test_empty_sql_rejected() {
        assert!(classify("   ", Dialect::SQLite).is_err());
    }
}
