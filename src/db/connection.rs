//! Database connections and transactions.
//!
//! # Architecture
//!
//! [`DbConnection`] wraps one backend handle per dialect: sqlx pools for MySQL
//! and SQLite, a blocking `oracle` session behind the `oracle` feature.
//! Execution code lives in per-dialect submodules that take a plain
//! connection, so the same code serves a pooled connection and an open
//! transaction.

use crate::config::PoolOptions;
use crate::credentials::Credentials;
use crate::db::normalize::normalize;
use crate::error::{DbError, DbResult};
use crate::models::{BoundQuery, Dialect, QueryOutcome, QueryParam, ResultTable, StatementKind};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{MySql, MySqlPool, Sqlite, SqlitePool, Transaction};
use std::time::Duration;
use tracing::{debug, info};

#[cfg(feature = "oracle")]
use crate::db::oracle::OracleSession;
#[cfg(feature = "oracle")]
use std::sync::Arc;

/// An open connection to one database.
#[derive(Clone)]
pub enum DbConnection {
    MySql(MySqlPool),
    SQLite(SqlitePool),
    #[cfg(feature = "oracle")]
    Oracle(Arc<OracleSession>),
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DbConnection({})", self.backend())
    }
}

impl DbConnection {
    /// Open a connection for an alias's credentials.
    ///
    /// `schema` selects the MySQL database; other dialects ignore it.
    pub async fn open(
        credentials: &Credentials,
        schema: Option<&str>,
        options: &PoolOptions,
    ) -> DbResult<Self> {
        match Dialect::resolve(&credentials.db)? {
            Dialect::Oracle => Self::open_oracle(credentials),
            _ => Self::connect_url(&credentials.connection_url(schema)?, options).await,
        }
    }

    /// Connect to a MySQL or SQLite URL.
    pub async fn connect_url(url: &str, options: &PoolOptions) -> DbResult<Self> {
        let dialect = Dialect::resolve(url)?;
        let acquire_timeout = Duration::from_secs(options.acquire_timeout_or_default());

        let connection = match dialect {
            Dialect::MySql => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(options.max_connections_or_default(false))
                    .acquire_timeout(acquire_timeout)
                    .test_before_acquire(options.test_before_acquire_or_default())
                    .connect(url)
                    .await
                    .map_err(|e| DbError::from_sqlx(dialect, e))?;
                Self::MySql(pool)
            }
            Dialect::SQLite => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(options.max_connections_or_default(true))
                    .acquire_timeout(acquire_timeout)
                    .connect(url)
                    .await
                    .map_err(|e| DbError::from_sqlx(dialect, e))?;
                Self::SQLite(pool)
            }
            Dialect::Oracle => {
                return Err(DbError::invalid_input(
                    "Oracle connections are opened from alias credentials, not URLs",
                ));
            }
        };

        info!(backend = connection.backend(), "Connected");
        Ok(connection)
    }

    #[cfg(feature = "oracle")]
    fn open_oracle(credentials: &Credentials) -> DbResult<Self> {
        let session = OracleSession::connect(
            &credentials.username,
            &credentials.password()?,
            &credentials.oracle_connect_string(),
        )?;
        info!(backend = "oracle", "Connected");
        Ok(Self::Oracle(Arc::new(session)))
    }

    #[cfg(not(feature = "oracle"))]
    fn open_oracle(_credentials: &Credentials) -> DbResult<Self> {
        Err(DbError::connection(
            "Oracle support is not compiled in",
            "Rebuild with --features oracle (requires Oracle Instant Client)",
        ))
    }

    /// Backend identifier of this connection.
    pub fn backend(&self) -> &'static str {
        match self {
            Self::MySql(_) => "mysql",
            Self::SQLite(_) => "sqlite",
            #[cfg(feature = "oracle")]
            Self::Oracle(_) => "oracle",
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Self::MySql(_) => Dialect::MySql,
            Self::SQLite(_) => Dialect::SQLite,
            #[cfg(feature = "oracle")]
            Self::Oracle(_) => Dialect::Oracle,
        }
    }

    /// Run a query and return its rows.
    pub async fn fetch(&self, query: &BoundQuery) -> DbResult<ResultTable> {
        Ok(self.run(&query.with_kind(StatementKind::Query)).await?.into_rows())
    }

    /// Run a command and return the affected row count.
    pub async fn execute(&self, query: &BoundQuery) -> DbResult<u64> {
        Ok(self.run(&query.with_kind(StatementKind::Command)).await?.rows_affected())
    }

    /// Run a bound query outside any transaction.
    pub async fn run(&self, query: &BoundQuery) -> DbResult<QueryOutcome> {
        match self {
            Self::MySql(pool) => {
                let mut conn = pool
                    .acquire()
                    .await
                    .map_err(|e| DbError::from_sqlx(Dialect::MySql, e))?;
                mysql::run(&mut conn, query).await
            }
            Self::SQLite(pool) => {
                let mut conn = pool
                    .acquire()
                    .await
                    .map_err(|e| DbError::from_sqlx(Dialect::SQLite, e))?;
                sqlite::run(&mut conn, query).await
            }
            #[cfg(feature = "oracle")]
            Self::Oracle(session) => session.run(query),
        }
    }

    /// Start a transaction holding a dedicated connection.
    pub async fn begin(&self) -> DbResult<DbTransaction> {
        let tx = match self {
            Self::MySql(pool) => DbTransaction::MySql(
                pool.begin()
                    .await
                    .map_err(|e| DbError::from_sqlx(Dialect::MySql, e))?,
            ),
            Self::SQLite(pool) => DbTransaction::SQLite(
                pool.begin()
                    .await
                    .map_err(|e| DbError::from_sqlx(Dialect::SQLite, e))?,
            ),
            // Oracle sessions never autocommit; the transaction is implicit
            #[cfg(feature = "oracle")]
            Self::Oracle(session) => DbTransaction::Oracle(session.clone()),
        };
        debug!(backend = self.backend(), "Transaction started");
        Ok(tx)
    }

    pub async fn close(&self) {
        match self {
            Self::MySql(pool) => pool.close().await,
            Self::SQLite(pool) => pool.close().await,
            #[cfg(feature = "oracle")]
            Self::Oracle(session) => session.close(),
        }
    }
}

/// Database-specific transaction wrapper.
pub enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    SQLite(Transaction<'static, Sqlite>),
    #[cfg(feature = "oracle")]
    Oracle(Arc<OracleSession>),
}

impl std::fmt::Debug for DbTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DbTransaction({})", self.dialect())
    }
}

impl DbTransaction {
    pub fn dialect(&self) -> Dialect {
        match self {
            Self::MySql(_) => Dialect::MySql,
            Self::SQLite(_) => Dialect::SQLite,
            #[cfg(feature = "oracle")]
            Self::Oracle(_) => Dialect::Oracle,
        }
    }

    pub async fn fetch(&mut self, query: &BoundQuery) -> DbResult<ResultTable> {
        Ok(self.run(&query.with_kind(StatementKind::Query)).await?.into_rows())
    }

    pub async fn execute(&mut self, query: &BoundQuery) -> DbResult<u64> {
        Ok(self.run(&query.with_kind(StatementKind::Command)).await?.rows_affected())
    }

    /// Run a bound query inside this transaction.
    pub async fn run(&mut self, query: &BoundQuery) -> DbResult<QueryOutcome> {
        match self {
            Self::MySql(tx) => mysql::run(&mut **tx, query).await,
            Self::SQLite(tx) => sqlite::run(&mut **tx, query).await,
            #[cfg(feature = "oracle")]
            Self::Oracle(session) => session.run(query),
        }
    }

    pub async fn commit(self) -> DbResult<()> {
        let dialect = self.dialect();
        match self {
            Self::MySql(tx) => tx.commit().await,
            Self::SQLite(tx) => tx.commit().await,
            #[cfg(feature = "oracle")]
            Self::Oracle(session) => return session.commit(),
        }
        .map_err(|e| DbError::from_sqlx(dialect, e))
    }

    pub async fn rollback(self) -> DbResult<()> {
        let dialect = self.dialect();
        match self {
            Self::MySql(tx) => tx.rollback().await,
            Self::SQLite(tx) => tx.rollback().await,
            #[cfg(feature = "oracle")]
            Self::Oracle(session) => return session.rollback(),
        }
        .map_err(|e| DbError::from_sqlx(dialect, e))
    }
}

fn log_query(dialect: Dialect, query: &BoundQuery) {
    debug!(
        dialect = %dialect,
        sql = %query.positional_sql,
        params = query.positional_params.len(),
        kind = ?query.kind,
        "Executing query"
    );
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Both modules provide the same interface adapted to the driver's types.
// Queries without parameters are sent as plain text, which avoids prepared
// statement restrictions (SHOW, ANALYZE, PRAGMA).

mod mysql {
    use super::*;
    use crate::db::types::{RowToValues, column_names};
    use sqlx::mysql::{MySqlArguments, MySqlRow};
    use sqlx::{Column, Executor, MySqlConnection};

    pub async fn run(conn: &mut MySqlConnection, query: &BoundQuery) -> DbResult<QueryOutcome> {
        log_query(Dialect::MySql, query);
        match query.kind {
            StatementKind::Query => fetch(conn, &query.positional_sql, &query.positional_params).await,
            StatementKind::Command => {
                let rows_affected = execute(conn, query).await?;
                match &query.follow_up {
                    Some(sql) => fetch(conn, sql, &[]).await,
                    None => Ok(QueryOutcome::Done { rows_affected }),
                }
            }
        }
    }

    async fn fetch(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<QueryOutcome> {
        let rows: Vec<MySqlRow> = if params.is_empty() {
            (&mut *conn).fetch_all(sql).await
        } else {
            let mut q = sqlx::query(sql);
            for param in params {
                q = bind_param(q, param);
            }
            q.fetch_all(&mut *conn).await
        }
        .map_err(|e| DbError::from_sqlx(Dialect::MySql, e))?;

        let columns = match rows.first() {
            Some(row) => column_names(row),
            None => match (&mut *conn).describe(sql).await {
                Ok(described) => described
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
                Err(e) => {
                    debug!(error = %e, "Could not describe empty result");
                    Vec::new()
                }
            },
        };
        let rows = rows.iter().map(|r| r.to_values()).collect();
        Ok(QueryOutcome::Rows(normalize(columns, rows)?))
    }

    async fn execute(conn: &mut MySqlConnection, query: &BoundQuery) -> DbResult<u64> {
        let result = if query.positional_params.is_empty() {
            (&mut *conn).execute(query.positional_sql.as_str()).await
        } else {
            let mut q = sqlx::query(&query.positional_sql);
            for param in &query.positional_params {
                q = bind_param(q, param);
            }
            q.execute(&mut *conn).await
        };
        result
            .map(|r| r.rows_affected())
            .map_err(|e| DbError::from_sqlx(Dialect::MySql, e))
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, MySql, MySqlArguments>,
        param: &'q QueryParam,
    ) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
        match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
        }
    }
}

mod sqlite {
    use super::*;
    use crate::db::types::{RowToValues, column_names};
    use sqlx::sqlite::{SqliteArguments, SqliteRow};
    use sqlx::{Column, Executor, SqliteConnection};

    pub async fn run(conn: &mut SqliteConnection, query: &BoundQuery) -> DbResult<QueryOutcome> {
        log_query(Dialect::SQLite, query);
        match query.kind {
            StatementKind::Query => fetch(conn, &query.positional_sql, &query.positional_params).await,
            StatementKind::Command => {
                let rows_affected = execute(conn, query).await?;
                match &query.follow_up {
                    Some(sql) => fetch(conn, sql, &[]).await,
                    None => Ok(QueryOutcome::Done { rows_affected }),
                }
            }
        }
    }

    async fn fetch(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<QueryOutcome> {
        let rows: Vec<SqliteRow> = if params.is_empty() {
            (&mut *conn).fetch_all(sql).await
        } else {
            let mut q = sqlx::query(sql);
            for param in params {
                q = bind_param(q, param);
            }
            q.fetch_all(&mut *conn).await
        }
        .map_err(|e| DbError::from_sqlx(Dialect::SQLite, e))?;

        let columns = match rows.first() {
            Some(row) => column_names(row),
            None => match (&mut *conn).describe(sql).await {
                Ok(described) => described
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
                Err(e) => {
                    debug!(error = %e, "Could not describe empty result");
                    Vec::new()
                }
            },
        };
        let rows = rows.iter().map(|r| r.to_values()).collect();
        Ok(QueryOutcome::Rows(normalize(columns, rows)?))
    }

    async fn execute(conn: &mut SqliteConnection, query: &BoundQuery) -> DbResult<u64> {
        let result = if query.positional_params.is_empty() {
            (&mut *conn).execute(query.positional_sql.as_str()).await
        } else {
            let mut q = sqlx::query(&query.positional_sql);
            for param in &query.positional_params {
                q = bind_param(q, param);
            }
            q.execute(&mut *conn).await
        };
        result
            .map(|r| r.rows_affected())
            .map_err(|e| DbError::from_sqlx(Dialect::SQLite, e))
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
        param: &'q QueryParam,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
        }
    }
}
