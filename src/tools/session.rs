//! Interactive session state.
//!
//! A [`Session`] carries the default connection, an optional open
//! transaction and the bind variables set by the user. While a transaction is
//! open every statement of the session runs inside it.

use crate::config::PoolOptions;
use crate::credentials::{AliasTarget, CredentialStore};
use crate::db::binder::{NameMatch, Request, bind_raw, prepare};
use crate::db::normalize::normalize;
use crate::db::placeholders::SqlText;
use crate::db::statement::classify;
use crate::db::{DbConnection, DbTransaction, TemplateLibrary};
use crate::error::{DbError, DbResult};
use crate::models::{BoundQuery, Dialect, QueryOutcome, QueryParam, ResultTable, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Session {
    store: Option<CredentialStore>,
    library: Arc<TemplateLibrary>,
    pool_options: PoolOptions,
    label: String,
    connection: DbConnection,
    dialect: Dialect,
    transaction: Option<DbTransaction>,
    variables: BTreeMap<String, QueryParam>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("label", &self.label)
            .field("dialect", &self.dialect)
            .field("in_transaction", &self.transaction.is_some())
            .field("variables", &self.variables.len())
            .finish()
    }
}

impl Session {
    /// Connect to `target` using the alias file.
    pub async fn open(
        store: CredentialStore,
        library: Arc<TemplateLibrary>,
        pool_options: PoolOptions,
        target: &AliasTarget,
    ) -> DbResult<Self> {
        let connection = Self::connect(&store, &pool_options, target).await?;
        let mut session = Self::with_connection(target.to_string(), connection, library)?;
        session.store = Some(store);
        session.pool_options = pool_options;
        Ok(session)
    }

    /// Wrap an already open connection. Alias switching is unavailable.
    pub fn with_connection(
        label: impl Into<String>,
        connection: DbConnection,
        library: Arc<TemplateLibrary>,
    ) -> DbResult<Self> {
        let dialect = Dialect::resolve(connection.backend())?;
        Ok(Self {
            store: None,
            library,
            pool_options: PoolOptions::default(),
            label: label.into(),
            connection,
            dialect,
            transaction: None,
            variables: BTreeMap::new(),
        })
    }

    async fn connect(
        store: &CredentialStore,
        pool_options: &PoolOptions,
        target: &AliasTarget,
    ) -> DbResult<DbConnection> {
        let credentials = store.get(&target.alias)?;
        DbConnection::open(credentials, target.schema.as_deref(), pool_options).await
    }

    fn store(&self) -> DbResult<&CredentialStore> {
        self.store
            .as_ref()
            .ok_or_else(|| DbError::config("no alias file loaded for this session"))
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn library(&self) -> &TemplateLibrary {
        &self.library
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// `(ALIAS.schema)> `, with `*` while a transaction is open.
    pub fn prompt(&self) -> String {
        let marker = if self.in_transaction() { "*" } else { "" };
        format!("({}){}> ", self.label, marker)
    }

    /// Make `target` the default connection.
    ///
    /// An open transaction on the old connection is rolled back.
    pub async fn switch(&mut self, target: &AliasTarget) -> DbResult<()> {
        let connection = Self::connect(self.store()?, &self.pool_options, target).await?;
        let dialect = Dialect::resolve(connection.backend())?;

        if let Some(tx) = self.transaction.take() {
            warn!(alias = %self.label, "Rolling back open transaction before switching connection");
            tx.rollback().await?;
        }
        self.connection.close().await;

        self.connection = connection;
        self.dialect = dialect;
        self.label = target.to_string();
        info!(alias = %self.label, dialect = %dialect, "Default connection changed");
        Ok(())
    }

    pub fn aliases(&self, filter: Option<&str>) -> DbResult<ResultTable> {
        self.store()?.aliases(filter)
    }

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------

    /// Run a request on the default connection, or the open transaction.
    pub async fn run(&mut self, request: &Request) -> DbResult<QueryOutcome> {
        let bound = prepare(&self.library, self.dialect, request)?;
        self.run_bound(&bound).await
    }

    /// Run a request on a one-off connection to `target`, if given.
    pub async fn run_on(
        &mut self,
        target: Option<&AliasTarget>,
        request: &Request,
    ) -> DbResult<QueryOutcome> {
        let Some(target) = target.filter(|t| t.to_string() != self.label) else {
            return self.run(request).await;
        };
        let connection = Self::connect(self.store()?, &self.pool_options, target).await?;
        let dialect = Dialect::resolve(connection.backend())?;
        let result = match prepare(&self.library, dialect, request) {
            Ok(bound) => connection.run(&bound).await,
            Err(e) => Err(e),
        };
        connection.close().await;
        result
    }

    async fn run_bound(&mut self, bound: &BoundQuery) -> DbResult<QueryOutcome> {
        match self.transaction.as_mut() {
            Some(tx) => tx.run(bound).await,
            None => self.connection.run(bound).await,
        }
    }

    /// Run free-form SQL.
    ///
    /// `:name` binds are taken from the session variables, then from `ask`.
    /// Outside an open transaction the statement runs in its own transaction,
    /// committed only when `commit` is set.
    pub async fn execute_sql<F>(
        &mut self,
        sql: &str,
        commit: bool,
        target: Option<&AliasTarget>,
        mut ask: F,
    ) -> DbResult<QueryOutcome>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let text = SqlText::raw(sql);
        let mut values = BTreeMap::new();
        for name in text.bind_names() {
            let value = match self.variables.get(&name) {
                Some(value) => value.clone(),
                None => ask(&name).map(QueryParam::String).ok_or_else(|| {
                    DbError::invalid_input(format!("no value for bind variable :{name}"))
                })?,
            };
            values.insert(name, value);
        }

        let other = target.filter(|t| t.to_string() != self.label);
        if let Some(tx) = self.transaction.as_mut() {
            if other.is_some() {
                return Err(DbError::transaction(
                    "a transaction is open on the default connection; commit or rollback before using -d",
                ));
            }
            let kind = classify(sql, self.dialect)?;
            let bound = bind_raw(&text, self.dialect, &values, kind)?;
            return tx.run(&bound).await;
        }

        let one_off = match other {
            Some(target) => Some(Self::connect(self.store()?, &self.pool_options, target).await?),
            None => None,
        };
        let connection = one_off.as_ref().unwrap_or(&self.connection);
        let dialect = Dialect::resolve(connection.backend())?;

        let result = match classify(sql, dialect).and_then(|kind| bind_raw(&text, dialect, &values, kind)) {
            Ok(bound) => Self::run_single(connection, &bound, commit).await,
            Err(e) => Err(e),
        };
        if let Some(connection) = one_off {
            connection.close().await;
        }
        result
    }

    async fn run_single(
        connection: &DbConnection,
        bound: &BoundQuery,
        commit: bool,
    ) -> DbResult<QueryOutcome> {
        let mut tx = connection.begin().await?;
        let outcome = match tx.run(bound).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    debug!(error = %rollback_err, "Rollback after failed statement failed");
                }
                return Err(e);
            }
        };
        if commit {
            tx.commit().await?;
            info!("Statement committed");
        } else {
            tx.rollback().await?;
            if matches!(outcome, QueryOutcome::Done { .. }) {
                info!("Statement rolled back; pass --commit to keep changes");
            }
        }
        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // Transactions and variables
    // -------------------------------------------------------------------------

    pub async fn begin(&mut self) -> DbResult<()> {
        if self.transaction.is_some() {
            return Err(DbError::transaction("a transaction is already open"));
        }
        self.transaction = Some(self.connection.begin().await?);
        info!(alias = %self.label, "Transaction started");
        Ok(())
    }

    pub async fn commit(&mut self) -> DbResult<()> {
        let tx = self
            .transaction
            .take()
            .ok_or_else(|| DbError::transaction("no open transaction"))?;
        tx.commit().await?;
        info!(alias = %self.label, "Transaction committed");
        Ok(())
    }

    pub async fn rollback(&mut self) -> DbResult<()> {
        let tx = self
            .transaction
            .take()
            .ok_or_else(|| DbError::transaction("no open transaction"))?;
        tx.rollback().await?;
        info!(alias = %self.label, "Transaction rolled back");
        Ok(())
    }

    pub fn set_variable(&mut self, name: &str, value: QueryParam) -> DbResult<()> {
        let name = name.trim().trim_start_matches(':');
        let valid = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(DbError::invalid_input(format!(
                "invalid bind variable name '{name}'"
            )));
        }
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    pub fn variables(&self) -> &BTreeMap<String, QueryParam> {
        &self.variables
    }

    // -------------------------------------------------------------------------
    // Composite operations
    // -------------------------------------------------------------------------

    /// Tables having `column` with at least one row equal to `value`.
    ///
    /// Columns are found by exact name, then each table is counted; tables
    /// without matches are left out.
    pub async fn find_tables_by_column_value(
        &mut self,
        column: &str,
        value: QueryParam,
    ) -> DbResult<ResultTable> {
        let found = self
            .run(&Request::FindColumns(NameMatch::exact(column)))
            .await?
            .into_rows();
        info!(column, tables = found.row_count(), "Scanning tables containing column");

        let mut candidates: Vec<(Value, String, String)> = (0..found.row_count())
            .filter_map(|i| {
                let owner = found.get(i, "owner").cloned().unwrap_or(Value::Null);
                let table = found.get(i, "table_name")?.as_str()?.to_string();
                let column = found.get(i, "column_name")?.as_str()?.to_string();
                Some((owner, table, column))
            })
            .collect();
        candidates.sort_by_key(|(owner, table, _)| {
            owner.as_str().map_or(0, str::len) + table.len()
        });

        let mut rows = Vec::new();
        for (owner, table, column_name) in candidates {
            let qualified = match owner.as_str() {
                Some(owner) => format!("{owner}.{table}"),
                None => table.clone(),
            };
            debug!(table = %qualified, "Counting matching rows");
            let request = Request::CountMatchingRows {
                table: qualified.clone(),
                column: column_name.clone(),
                value: value.clone(),
            };
            let counted = match self.run(&request).await {
                Ok(outcome) => outcome.into_rows(),
                Err(e) => {
                    warn!(table = %qualified, error = %e, "Skipping table");
                    continue;
                }
            };
            let count = counted.rows.first().and_then(|r| r.first()).and_then(Value::as_i64).unwrap_or(0);
            if count > 0 {
                rows.push(vec![owner, Value::Text(table), Value::Text(column_name), Value::Int(count)]);
            }
        }

        normalize(
            vec![
                "owner".to_string(),
                "table_name".to_string(),
                "column_name".to_string(),
                "cnt".to_string(),
            ],
            rows,
        )
    }

    /// Roll back any open transaction and close the connection.
    pub async fn close(mut self) {
        if let Some(tx) = self.transaction.take() {
            warn!(alias = %self.label, "Rolling back open transaction on exit");
            if let Err(e) = tx.rollback().await {
                warn!(error = %e, "Rollback on exit failed");
            }
        }
        self.connection.close().await;
    }
}
