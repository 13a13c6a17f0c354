//! Integration tests for the session layer against a SQLite database.
//!
//! Tests verify that:
//! - Catalog requests bind and run through the SQLite templates
//! - Free-form SQL takes bind values from variables or the prompt callback
//! - Statements outside a transaction only persist with commit
//! - Explicit transactions commit, roll back and mark the prompt
//! - find-value counts matches across tables sharing a column

use dba_shell::config::PoolOptions;
use dba_shell::db::{AggregateSpec, DbConnection, GroupedCount, NameMatch, Request, TemplateLibrary};
use dba_shell::error::DbError;
use dba_shell::models::{Dialect, Operation, QueryOutcome, QueryParam, ResultTable, Value};
use dba_shell::tools::Session;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn no_prompt(_name: &str) -> Option<String> {
    None
}

/// Create a session on a fresh SQLite file with sample data.
async fn setup_session() -> (Session, String) {
    let temp_file = NamedTempFile::new().unwrap();
    // Keep the file after the handle is dropped
    let db_path = temp_file
        .into_temp_path()
        .keep()
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let url = format!("sqlite:{}?mode=rwc", db_path);
    let connection = DbConnection::connect_url(&url, &PoolOptions::default())
        .await
        .unwrap();
    let library = Arc::new(TemplateLibrary::builtin().unwrap());
    let mut session = Session::with_connection("LOCAL", connection, library).unwrap();

    let statements = [
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, status TEXT)",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER, status TEXT, amount REAL)",
        "CREATE TABLE archive (id INTEGER PRIMARY KEY, status TEXT)",
        "CREATE VIEW open_orders AS SELECT * FROM orders WHERE status = 'open'",
        "INSERT INTO customers (id, name, status) VALUES (1, 'Ada', 'open'), (2, 'Linus', 'vip')",
        "INSERT INTO orders (id, customer_id, status, amount) VALUES \
         (1, 1, 'open', 10.5), (2, 1, 'open', 20.0), (3, 2, 'open', 5.0), (4, 2, 'closed', 7.25)",
        "INSERT INTO archive (id, status) VALUES (1, 'closed')",
    ];
    for sql in statements {
        session.execute_sql(sql, true, None, no_prompt).await.unwrap();
    }

    (session, db_path)
}

async fn count_orders(session: &mut Session) -> i64 {
    let table = session
        .execute_sql("SELECT count(*) cnt FROM orders", false, None, no_prompt)
        .await
        .unwrap()
        .into_rows();
    table.get(0, "cnt").and_then(Value::as_i64).unwrap()
}

fn rows(outcome: QueryOutcome) -> ResultTable {
    match outcome {
        QueryOutcome::Rows(table) => table,
        other => panic!("expected rows, got {other:?}"),
    }
}

#[tokio::test]
async fn test_find_tables_substring_and_exact() {
    let (mut session, _path) = setup_session().await;
    assert_eq!(session.dialect(), Dialect::SQLite);

    let found = rows(
        session
            .run(&Request::FindTables(NameMatch::substring("ORD")))
            .await
            .unwrap(),
    );
    assert_eq!(found.row_count(), 1);
    assert_eq!(found.get(0, "table_name"), Some(&Value::from("orders")));
    assert_eq!(found.get(0, "owner"), Some(&Value::Null));

    let exact = rows(
        session
            .run(&Request::FindTables(NameMatch::exact("ord")))
            .await
            .unwrap(),
    );
    assert!(exact.is_empty());
    // columns survive an empty result
    assert_eq!(exact.column_names(), vec!["table_name", "owner", "last_analyzed"]);
}

#[tokio::test]
async fn test_find_views() {
    let (mut session, _path) = setup_session().await;
    let found = rows(
        session
            .run(&Request::FindViews(NameMatch::substring("open")))
            .await
            .unwrap(),
    );
    assert_eq!(found.get(0, "view_name"), Some(&Value::from("open_orders")));
}

#[tokio::test]
async fn test_describe_table() {
    let (mut session, _path) = setup_session().await;
    let described = rows(
        session
            .run(&Request::DescribeTable(NameMatch::exact("orders")))
            .await
            .unwrap(),
    );
    assert_eq!(described.row_count(), 4);
    assert_eq!(described.get(0, "name"), Some(&Value::from("id")));
    assert_eq!(described.get(3, "name"), Some(&Value::from("amount")));
}

#[tokio::test]
async fn test_describe_rejects_bad_identifier() {
    let (mut session, _path) = setup_session().await;
    let err = session
        .run(&Request::DescribeTable(NameMatch::exact("orders; drop table orders")))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
    assert_eq!(count_orders(&mut session).await, 4);
}

#[tokio::test]
async fn test_list_indexes_unsupported_on_sqlite() {
    let (mut session, _path) = setup_session().await;
    let err = session
        .run(&Request::ListIndexes(NameMatch::exact("orders")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::UnsupportedOperation {
            operation: Operation::ListIndexes,
            dialect: Dialect::SQLite,
        }
    ));
}

#[tokio::test]
async fn test_version() {
    let (mut session, _path) = setup_session().await;
    let version = rows(session.run(&Request::GetVersion).await.unwrap());
    let text = version.get(0, "version").and_then(Value::as_str).unwrap();
    assert!(text.starts_with('3'), "unexpected version {text}");
}

#[tokio::test]
async fn test_grouped_count_orders_by_count() {
    let (mut session, _path) = setup_session().await;
    let request = GroupedCount::new("orders").group_by(["status"]);
    let counts = rows(session.run(&Request::GroupedCount(request)).await.unwrap());

    assert_eq!(counts.column_names(), vec!["status", "cnt"]);
    assert_eq!(counts.rows[0], vec![Value::from("open"), Value::Int(3)]);
    assert_eq!(counts.rows[1], vec![Value::from("closed"), Value::Int(1)]);
}

#[tokio::test]
async fn test_grouped_count_with_aggregates_and_filter() {
    let (mut session, _path) = setup_session().await;
    let request = GroupedCount::new("orders")
        .group_by(["customer_id"])
        .aggregate(AggregateSpec::parse("count_distinct:status").unwrap())
        .aggregate(AggregateSpec::parse("max:amount").unwrap())
        .filter("amount > 6")
        .sort_by(1, true);
    let counts = rows(session.run(&Request::GroupedCount(request)).await.unwrap());

    assert_eq!(
        counts.column_names(),
        vec!["customer_id", "distinct_status", "max_amount"]
    );
    assert_eq!(counts.row_count(), 2);
    assert_eq!(counts.get(0, "customer_id"), Some(&Value::Int(1)));
    assert_eq!(counts.get(0, "max_amount"), Some(&Value::Float(20.0)));
    assert_eq!(counts.get(1, "distinct_status"), Some(&Value::Int(1)));
}

#[tokio::test]
async fn test_grouped_count_without_columns() {
    let (mut session, _path) = setup_session().await;
    let counts = rows(
        session
            .run(&Request::GroupedCount(GroupedCount::new("orders")))
            .await
            .unwrap(),
    );
    assert_eq!(counts.rows, vec![vec![Value::Int(4)]]);
}

#[tokio::test]
async fn test_load_table_and_full_sample() {
    let (mut session, _path) = setup_session().await;
    let all = rows(
        session
            .run(&Request::LoadTable {
                table: "customers".into(),
            })
            .await
            .unwrap(),
    );
    assert_eq!(all.row_count(), 2);
    assert_eq!(all.column_names(), vec!["id", "name", "status"]);

    let sample = rows(
        session
            .run(&Request::LoadSample {
                table: "orders".into(),
                percent: 100.0,
            })
            .await
            .unwrap(),
    );
    assert_eq!(sample.row_count(), 4);

    let err = session
        .run(&Request::LoadSample {
            table: "orders".into(),
            percent: 0.0,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_object_source_and_explain() {
    let (mut session, _path) = setup_session().await;
    let source = rows(
        session
            .run(&Request::ObjectSource {
                object_type: "table".into(),
                name: "ORDERS".into(),
            })
            .await
            .unwrap(),
    );
    let ddl = source.get(0, "ddl").and_then(Value::as_str).unwrap();
    assert!(ddl.starts_with("CREATE TABLE orders"));

    let plan = rows(
        session
            .run(&Request::Explain {
                sql: "SELECT * FROM orders WHERE id = 1;".into(),
            })
            .await
            .unwrap(),
    );
    assert!(!plan.is_empty());
}

#[tokio::test]
async fn test_gather_stats_is_a_command() {
    let (mut session, _path) = setup_session().await;
    let outcome = session
        .run(&Request::GatherStats {
            table: "orders".into(),
        })
        .await
        .unwrap();
    assert!(matches!(outcome, QueryOutcome::Done { .. }));
}

#[tokio::test]
async fn test_sql_binds_from_variables_and_prompt() {
    let (mut session, _path) = setup_session().await;
    session
        .set_variable(":st", QueryParam::String("open".into()))
        .unwrap();

    let table = session
        .execute_sql(
            "SELECT count(*) cnt FROM orders WHERE status = :st AND customer_id = :cust",
            false,
            None,
            |name| (name == "cust").then(|| "1".to_string()),
        )
        .await
        .unwrap()
        .into_rows();
    assert_eq!(table.get(0, "cnt"), Some(&Value::Int(2)));
    assert!(session.variables().contains_key("st"));
}

#[tokio::test]
async fn test_sql_missing_bind_fails() {
    let (mut session, _path) = setup_session().await;
    let err = session
        .execute_sql("SELECT * FROM orders WHERE id = :id", false, None, no_prompt)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_invalid_variable_name() {
    let (mut session, _path) = setup_session().await;
    assert!(session.set_variable("bad name", QueryParam::Int(1)).is_err());
    assert!(session.set_variable("", QueryParam::Int(1)).is_err());
}

#[tokio::test]
async fn test_sql_without_commit_is_rolled_back() {
    let (mut session, _path) = setup_session().await;
    let outcome = session
        .execute_sql(
            "INSERT INTO orders (id, customer_id, status, amount) VALUES (5, 1, 'open', 1.0)",
            false,
            None,
            no_prompt,
        )
        .await
        .unwrap();
    assert_eq!(outcome.rows_affected(), 1);
    assert_eq!(count_orders(&mut session).await, 4);

    session
        .execute_sql(
            "INSERT INTO orders (id, customer_id, status, amount) VALUES (5, 1, 'open', 1.0)",
            true,
            None,
            no_prompt,
        )
        .await
        .unwrap();
    assert_eq!(count_orders(&mut session).await, 5);
}

#[tokio::test]
async fn test_sql_rejects_transaction_control() {
    let (mut session, _path) = setup_session().await;
    for sql in ["COMMIT", "ROLLBACK", "BEGIN TRANSACTION"] {
        let err = session
            .execute_sql(sql, false, None, no_prompt)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }), "{sql}: {err}");
    }
}

#[tokio::test]
async fn test_sql_backend_error_keeps_session_usable() {
    let (mut session, _path) = setup_session().await;
    let err = session
        .execute_sql("SELECT * FROM no_such_table", false, None, no_prompt)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Backend { dialect: Dialect::SQLite, .. }));
    assert_eq!(count_orders(&mut session).await, 4);
}

#[tokio::test]
async fn test_transaction_rollback() {
    let (mut session, _path) = setup_session().await;
    assert_eq!(session.prompt(), "(LOCAL)> ");

    session.begin().await.unwrap();
    assert!(session.in_transaction());
    assert_eq!(session.prompt(), "(LOCAL)*> ");

    // --commit is ignored while a transaction is open
    session
        .execute_sql("DELETE FROM orders WHERE status = 'open'", true, None, no_prompt)
        .await
        .unwrap();
    assert_eq!(count_orders(&mut session).await, 1);

    session.rollback().await.unwrap();
    assert!(!session.in_transaction());
    assert_eq!(count_orders(&mut session).await, 4);
}

#[tokio::test]
async fn test_transaction_commit() {
    let (mut session, _path) = setup_session().await;
    session.begin().await.unwrap();
    session
        .execute_sql("DELETE FROM orders WHERE id = 4", false, None, no_prompt)
        .await
        .unwrap();
    session.commit().await.unwrap();
    assert_eq!(count_orders(&mut session).await, 3);
}

#[tokio::test]
async fn test_transaction_state_errors() {
    let (mut session, _path) = setup_session().await;
    assert!(matches!(
        session.commit().await.unwrap_err(),
        DbError::Transaction { .. }
    ));
    assert!(matches!(
        session.rollback().await.unwrap_err(),
        DbError::Transaction { .. }
    ));

    session.begin().await.unwrap();
    assert!(matches!(
        session.begin().await.unwrap_err(),
        DbError::Transaction { .. }
    ));

    let other = "OTHER".parse().unwrap();
    let err = session
        .execute_sql("SELECT 1", false, Some(&other), no_prompt)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Transaction { .. }));
    session.rollback().await.unwrap();
}

#[tokio::test]
async fn test_catalog_requests_see_open_transaction() {
    let (mut session, _path) = setup_session().await;
    session.begin().await.unwrap();
    session
        .execute_sql("CREATE TABLE scratch (id INTEGER)", false, None, no_prompt)
        .await
        .unwrap();
    let found = rows(
        session
            .run(&Request::FindTables(NameMatch::exact("scratch")))
            .await
            .unwrap(),
    );
    assert_eq!(found.row_count(), 1);
    session.rollback().await.unwrap();

    let found = rows(
        session
            .run(&Request::FindTables(NameMatch::exact("scratch")))
            .await
            .unwrap(),
    );
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_find_tables_by_column_value() {
    let (mut session, _path) = setup_session().await;
    let found = session
        .find_tables_by_column_value("status", QueryParam::String("open".into()))
        .await
        .unwrap();

    assert_eq!(found.column_names(), vec!["owner", "table_name", "column_name", "cnt"]);
    // shortest names first; archive has no match
    assert_eq!(found.row_count(), 2);
    assert_eq!(found.get(0, "table_name"), Some(&Value::from("orders")));
    assert_eq!(found.get(0, "cnt"), Some(&Value::Int(3)));
    assert_eq!(found.get(1, "table_name"), Some(&Value::from("customers")));
    assert_eq!(found.get(1, "cnt"), Some(&Value::Int(1)));
}

#[tokio::test]
async fn test_exact_column_name_treats_underscore_literally() {
    let (mut session, _path) = setup_session().await;
    for sql in [
        "CREATE TABLE ledger (id INTEGER PRIMARY KEY, customerXid INTEGER)",
        "INSERT INTO ledger (id, customerXid) VALUES (1, 1), (2, 1)",
    ] {
        session.execute_sql(sql, true, None, no_prompt).await.unwrap();
    }

    let columns = rows(
        session
            .run(&Request::FindColumns(NameMatch::exact("customer_id")))
            .await
            .unwrap(),
    );
    assert_eq!(columns.row_count(), 1);
    assert_eq!(columns.get(0, "table_name"), Some(&Value::from("orders")));

    // the substring form still uses `_` as a wildcard
    let loose = rows(
        session
            .run(&Request::FindColumns(NameMatch::substring("customer_id")))
            .await
            .unwrap(),
    );
    assert_eq!(loose.row_count(), 2);

    let found = session
        .find_tables_by_column_value("customer_id", QueryParam::Int(1))
        .await
        .unwrap();
    assert_eq!(found.row_count(), 1);
    assert_eq!(found.get(0, "table_name"), Some(&Value::from("orders")));
    assert_eq!(found.get(0, "cnt"), Some(&Value::Int(2)));
}

#[tokio::test]
async fn test_find_tables_by_column_value_no_match() {
    let (mut session, _path) = setup_session().await;
    let found = session
        .find_tables_by_column_value("no_such_column", QueryParam::Int(1))
        .await
        .unwrap();
    assert!(found.is_empty());
    assert_eq!(found.columns.len(), 4);
}

#[tokio::test]
async fn test_switch_needs_alias_file() {
    let (mut session, _path) = setup_session().await;
    let err = session.switch(&"OTHER".parse().unwrap()).await.unwrap_err();
    assert!(matches!(err, DbError::Config { .. }));
    assert_eq!(session.label(), "LOCAL");
    session.close().await;
}
