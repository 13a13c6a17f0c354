//! Per-dialect query templates for catalog operations.
//!
//! # Architecture
//!
//! SQL text lives in the `queries` submodule with one constant per operation
//! for each dialect. The registry below pairs each constant with its
//! (operation, dialect) key; [`TemplateLibrary::builtin`] parses and checks
//! every entry once at startup, so a template whose placeholders drift from
//! its operation's signature is caught before any query runs.

use crate::db::placeholders::SqlText;
use crate::error::{DbError, DbResult};
use crate::models::{Dialect, Operation, StatementKind};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A static registry entry.
#[derive(Debug, Clone, Copy)]
pub struct TemplateDef {
    pub operation: Operation,
    pub dialect: Dialect,
    pub kind: StatementKind,
    pub sql: &'static str,
    pub follow_up: Option<&'static str>,
}

const fn query(operation: Operation, dialect: Dialect, sql: &'static str) -> TemplateDef {
    TemplateDef {
        operation,
        dialect,
        kind: StatementKind::Query,
        sql,
        follow_up: None,
    }
}

const fn command(operation: Operation, dialect: Dialect, sql: &'static str) -> TemplateDef {
    TemplateDef {
        operation,
        dialect,
        kind: StatementKind::Command,
        sql,
        follow_up: None,
    }
}

/// A parsed template for one (operation, dialect) pair.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    pub operation: Operation,
    pub dialect: Dialect,
    pub kind: StatementKind,
    pub text: SqlText,
    pub source: &'static str,
    pub follow_up: Option<&'static str>,
}

impl QueryTemplate {
    pub fn placeholder_names(&self) -> BTreeSet<String> {
        self.text.placeholder_names()
    }
}

/// All registered templates, keyed by (operation, dialect).
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    templates: HashMap<(Operation, Dialect), QueryTemplate>,
}

impl TemplateLibrary {
    /// Build the library from the built-in registry.
    pub fn builtin() -> DbResult<Self> {
        Self::from_defs(REGISTRY)
    }

    /// Build and validate a library from template definitions.
    ///
    /// Fails if an entry is registered twice, if a template's placeholder set
    /// differs from its operation's parameters, if a follow-up query has
    /// placeholders, or if some operation has no template at all.
    pub fn from_defs(defs: &[TemplateDef]) -> DbResult<Self> {
        let mut templates = HashMap::new();

        for def in defs {
            let text = SqlText::template(def.sql);
            let found = text.placeholder_names();
            let expected: BTreeSet<String> = def
                .operation
                .parameters()
                .iter()
                .map(|p| p.to_string())
                .collect();
            if found != expected {
                return Err(DbError::template(format!(
                    "{} template for {} uses placeholders {:?}, expected {:?}",
                    def.dialect, def.operation, found, expected
                )));
            }
            if let Some(follow_up) = def.follow_up
                && !SqlText::template(follow_up).placeholder_names().is_empty()
            {
                return Err(DbError::template(format!(
                    "{} follow-up query for {} must not take parameters",
                    def.dialect, def.operation
                )));
            }

            let template = QueryTemplate {
                operation: def.operation,
                dialect: def.dialect,
                kind: def.kind,
                text,
                source: def.sql,
                follow_up: def.follow_up,
            };
            if templates
                .insert((def.operation, def.dialect), template)
                .is_some()
            {
                return Err(DbError::template(format!(
                    "{} template for {} registered twice",
                    def.dialect, def.operation
                )));
            }
        }

        for op in Operation::ALL {
            if !Dialect::ALL
                .iter()
                .any(|d| templates.contains_key(&(op, *d)))
            {
                return Err(DbError::template(format!(
                    "operation {op} has no template for any dialect"
                )));
            }
        }

        debug!(count = templates.len(), "Loaded query templates");
        Ok(Self { templates })
    }

    /// Look up the template for an operation on a dialect.
    pub fn template_for(&self, operation: Operation, dialect: Dialect) -> DbResult<&QueryTemplate> {
        self.templates
            .get(&(operation, dialect))
            .ok_or_else(|| DbError::unsupported_operation(operation, dialect))
    }

    pub fn supports(&self, operation: Operation, dialect: Dialect) -> bool {
        self.templates.contains_key(&(operation, dialect))
    }

    /// Dialects with a template for `operation`.
    pub fn supported_dialects(&self, operation: Operation) -> Vec<Dialect> {
        Dialect::ALL
            .into_iter()
            .filter(|d| self.supports(operation, *d))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryTemplate> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

// =============================================================================
// Registry
// =============================================================================

use Dialect::{MySql, Oracle, SQLite};
use Operation::*;

const REGISTRY: &[TemplateDef] = &[
    query(FindTables, Oracle, queries::oracle::FIND_TABLES),
    query(FindTables, MySql, queries::mysql::FIND_TABLES),
    query(FindTables, SQLite, queries::sqlite::FIND_TABLES),
    query(FindViews, Oracle, queries::oracle::FIND_VIEWS),
    query(FindViews, MySql, queries::mysql::FIND_VIEWS),
    query(FindViews, SQLite, queries::sqlite::FIND_VIEWS),
    query(DescribeTable, Oracle, queries::oracle::DESCRIBE_TABLE),
    query(DescribeTable, MySql, queries::mysql::DESCRIBE_TABLE),
    query(DescribeTable, SQLite, queries::sqlite::DESCRIBE_TABLE),
    query(ListIndexes, Oracle, queries::oracle::LIST_INDEXES),
    query(ListIndexes, MySql, queries::mysql::LIST_INDEXES),
    query(GetVersion, Oracle, queries::oracle::GET_VERSION),
    query(GetVersion, MySql, queries::mysql::GET_VERSION),
    query(GetVersion, SQLite, queries::sqlite::GET_VERSION),
    query(LoadSample, Oracle, queries::oracle::LOAD_SAMPLE),
    query(LoadSample, MySql, queries::mysql::LOAD_SAMPLE),
    query(LoadSample, SQLite, queries::sqlite::LOAD_SAMPLE),
    query(LoadTable, Oracle, queries::LOAD_TABLE),
    query(LoadTable, MySql, queries::LOAD_TABLE),
    query(LoadTable, SQLite, queries::LOAD_TABLE),
    query(GroupedCount, Oracle, queries::GROUPED_COUNT),
    query(GroupedCount, MySql, queries::GROUPED_COUNT),
    query(GroupedCount, SQLite, queries::GROUPED_COUNT),
    query(FindColumns, Oracle, queries::oracle::FIND_COLUMNS),
    query(FindColumns, MySql, queries::mysql::FIND_COLUMNS),
    query(FindColumns, SQLite, queries::sqlite::FIND_COLUMNS),
    query(FindPackages, Oracle, queries::oracle::FIND_PACKAGES),
    query(FindFunctions, Oracle, queries::oracle::FIND_FUNCTIONS),
    query(PackageFunctions, Oracle, queries::oracle::PACKAGE_FUNCTIONS),
    query(ObjectSource, Oracle, queries::oracle::OBJECT_SOURCE),
    query(ObjectSource, SQLite, queries::sqlite::OBJECT_SOURCE),
    query(TableStats, Oracle, queries::oracle::TABLE_STATS),
    query(TableStats, MySql, queries::mysql::TABLE_STATS),
    query(ColumnStats, Oracle, queries::oracle::COLUMN_STATS),
    command(GatherStats, Oracle, queries::oracle::GATHER_STATS),
    // ANALYZE TABLE reports a status row per table
    query(GatherStats, MySql, queries::mysql::GATHER_STATS),
    command(GatherStats, SQLite, queries::sqlite::GATHER_STATS),
    TemplateDef {
        follow_up: Some(queries::oracle::EXPLAIN_DISPLAY),
        ..command(Explain, Oracle, queries::oracle::EXPLAIN)
    },
    query(Explain, MySql, queries::mysql::EXPLAIN),
    query(Explain, SQLite, queries::sqlite::EXPLAIN),
    query(CountMatchingRows, Oracle, queries::COUNT_MATCHING_ROWS),
    query(CountMatchingRows, MySql, queries::COUNT_MATCHING_ROWS),
    query(CountMatchingRows, SQLite, queries::COUNT_MATCHING_ROWS),
];

// =============================================================================
// SQL Query Templates
// =============================================================================
//
// `:name` is a driver bind, `{name}` a text slot filled by the binder.
// Name patterns arrive already wildcarded; templates only compare.

mod queries {
    pub const LOAD_TABLE: &str = "SELECT * FROM {table}";

    pub const GROUPED_COUNT: &str =
        "SELECT {select_list} FROM {table}{where_clause}{group_by_clause}{order_by_clause}";

    pub const COUNT_MATCHING_ROWS: &str = "SELECT count(1) cnt FROM {table} WHERE {col} = :val";

    pub mod oracle {
        pub const FIND_TABLES: &str = r#"
            SELECT table_name, owner, last_analyzed
            FROM all_tables
            WHERE table_name LIKE UPPER(:tab) ESCAPE '\'
            ORDER BY 1, 2
        "#;

        pub const FIND_VIEWS: &str = r#"
            SELECT view_name, owner, view_type, text_length
            FROM all_views
            WHERE view_name LIKE UPPER(:view) ESCAPE '\'
            ORDER BY 1, 2
        "#;

        pub const DESCRIBE_TABLE: &str = r#"
            SELECT owner, table_name, column_name, nullable, data_type,
                   data_length, char_used, last_analyzed
            FROM all_tab_columns
            WHERE table_name LIKE UPPER(:tab) ESCAPE '\'
            ORDER BY owner, table_name, column_id
        "#;

        pub const LIST_INDEXES: &str = r#"
            SELECT a.table_name, a.index_name, a.column_name, a.column_position,
                   b.index_type, b.status, b.last_analyzed
            FROM all_ind_columns a
            JOIN all_indexes b ON b.owner = a.index_owner AND b.index_name = a.index_name
            WHERE a.table_name LIKE UPPER(:tab) ESCAPE '\'
            ORDER BY a.table_owner, a.index_name, a.column_position
        "#;

        pub const GET_VERSION: &str = "SELECT banner version FROM v$version";

        pub const LOAD_SAMPLE: &str = "SELECT * FROM {table} SAMPLE({pct})";

        pub const FIND_COLUMNS: &str = r#"
            SELECT owner, table_name, column_name, nullable, data_type, data_length
            FROM all_tab_columns
            WHERE column_name LIKE UPPER(:col) ESCAPE '\'
            ORDER BY owner, table_name, column_id
        "#;

        pub const FIND_PACKAGES: &str = r#"
            SELECT DISTINCT owner, LOWER(object_name) package_name
            FROM all_procedures
            WHERE object_type = 'PACKAGE'
              AND owner NOT LIKE '%SYS' AND owner <> 'XDB'
              AND object_name LIKE UPPER(:pkg) ESCAPE '\'
            ORDER BY 1, 2
        "#;

        pub const FIND_FUNCTIONS: &str = r#"
            SELECT LOWER(p.owner) owner, LOWER(p.object_name) package_name,
                   LOWER(p.procedure_name) procedure_name,
                   '(' || LOWER(LISTAGG(a.argument_name || ' ' || a.in_out || ' ' || a.data_type, ', ')
                        WITHIN GROUP (ORDER BY a.position)) || ')' arguments
            FROM all_procedures p
            JOIN all_arguments a
              ON a.owner = p.owner AND a.package_name = p.object_name
             AND a.object_name = p.procedure_name AND a.subprogram_id = p.subprogram_id
            WHERE p.object_type = 'PACKAGE'
              AND p.owner NOT LIKE '%SYS' AND p.owner <> 'XDB'
              AND p.procedure_name LIKE UPPER(:func) ESCAPE '\'
              AND a.argument_name IS NOT NULL
            GROUP BY p.owner, p.object_name, p.procedure_name, p.subprogram_id
            ORDER BY 3, 1, 2
        "#;

        pub const PACKAGE_FUNCTIONS: &str = r#"
            SELECT LOWER(p.owner) owner, LOWER(p.object_name) package_name,
                   LOWER(p.procedure_name) procedure_name,
                   '(' || LOWER(LISTAGG(a.argument_name || ' ' || a.in_out || ' ' || a.data_type, ', ')
                        WITHIN GROUP (ORDER BY a.position)) || ')' arguments
            FROM all_procedures p
            JOIN all_arguments a
              ON a.owner = p.owner AND a.package_name = p.object_name
             AND a.object_name = p.procedure_name AND a.subprogram_id = p.subprogram_id
            WHERE p.object_type = 'PACKAGE'
              AND p.owner NOT LIKE '%SYS' AND p.owner <> 'XDB'
              AND p.object_name LIKE UPPER(:pkg) ESCAPE '\'
              AND a.argument_name IS NOT NULL
            GROUP BY p.owner, p.object_name, p.procedure_name, p.subprogram_id
            ORDER BY 3, 1
        "#;

        pub const OBJECT_SOURCE: &str = r#"
            SELECT DBMS_METADATA.GET_DDL(UPPER(:object_type), UPPER(:name)) ddl FROM dual
        "#;

        pub const TABLE_STATS: &str = r#"
            SELECT owner, table_name, object_type, num_rows, avg_row_len, last_analyzed
            FROM all_tab_statistics
            WHERE table_name = UPPER(:tbl)
        "#;

        pub const COLUMN_STATS: &str = r#"
            SELECT c.column_id, s.column_name, t.num_rows, s.num_distinct, s.num_nulls,
                   t.num_rows - s.num_nulls not_nulls, s.avg_col_len
            FROM all_tab_col_statistics s
            JOIN all_tab_cols c
              ON c.owner = s.owner AND c.table_name = s.table_name AND c.column_name = s.column_name
            JOIN all_tab_statistics t
              ON t.owner = s.owner AND t.table_name = s.table_name AND t.object_type = 'TABLE'
            WHERE s.table_name = UPPER(:tbl)
              AND s.column_name NOT LIKE 'SYS\_%' ESCAPE '\'
            ORDER BY c.column_id
        "#;

        /// `:tbl` is `TABLE` or `OWNER.TABLE`; the owner defaults to the current user.
        pub const GATHER_STATS: &str = r#"
            BEGIN
              DBMS_STATS.GATHER_TABLE_STATS(
                NVL(UPPER(SUBSTR(:tbl, 1, INSTR(:tbl, '.') - 1)), USER),
                UPPER(SUBSTR(:tbl, INSTR(:tbl, '.') + 1)),
                estimate_percent => 100,
                cascade => TRUE);
            END;
        "#;

        pub const EXPLAIN: &str = "EXPLAIN PLAN FOR {sql}";

        pub const EXPLAIN_DISPLAY: &str = "SELECT plan_table_output FROM TABLE(DBMS_XPLAN.DISPLAY)";
    }

    // MySQL LIKE already escapes with a backslash
    pub mod mysql {
        pub const FIND_TABLES: &str = r#"
            SELECT table_name, table_schema owner, update_time last_analyzed
            FROM information_schema.tables
            WHERE UPPER(table_name) LIKE UPPER(:tab) AND table_type LIKE '%TABLE%'
            ORDER BY 1, 2
        "#;

        pub const FIND_VIEWS: &str = r#"
            SELECT table_name view_name, table_schema owner, is_updatable, check_option
            FROM information_schema.views
            WHERE UPPER(table_name) LIKE UPPER(:view)
            ORDER BY 1, 2
        "#;

        pub const DESCRIBE_TABLE: &str = r#"
            SELECT table_schema owner, table_name, column_name, is_nullable nullable,
                   column_type data_type, character_maximum_length data_length,
                   NULL char_used, NULL last_analyzed
            FROM information_schema.columns
            WHERE UPPER(table_name) LIKE UPPER(:tab)
            ORDER BY table_schema, table_name, ordinal_position
        "#;

        pub const LIST_INDEXES: &str = r#"
            SELECT table_name, index_name, column_name, seq_in_index column_position,
                   index_type, NULL status, NULL last_analyzed
            FROM information_schema.statistics
            WHERE UPPER(table_name) LIKE UPPER(:tab)
            ORDER BY table_schema, table_name, index_name, seq_in_index
        "#;

        pub const GET_VERSION: &str = "SHOW VARIABLES LIKE '%version%'";

        pub const LOAD_SAMPLE: &str = "SELECT * FROM {table} WHERE RAND() < {pct} / 100";

        pub const FIND_COLUMNS: &str = r#"
            SELECT table_schema owner, table_name, column_name, is_nullable nullable,
                   column_type data_type, character_maximum_length data_length
            FROM information_schema.columns
            WHERE UPPER(column_name) LIKE UPPER(:col)
            ORDER BY table_schema, table_name, ordinal_position
        "#;

        pub const TABLE_STATS: &str = r#"
            SELECT table_schema owner, table_name, table_type object_type, table_rows num_rows,
                   avg_row_length avg_row_len, data_length, index_length, update_time last_analyzed
            FROM information_schema.tables
            WHERE UPPER(table_name) = UPPER(:tbl)
        "#;

        pub const GATHER_STATS: &str = "ANALYZE TABLE {tbl}";

        pub const EXPLAIN: &str = "EXPLAIN {sql}";
    }

    pub mod sqlite {
        // SQLite LIKE is case-insensitive for ASCII already
        pub const FIND_TABLES: &str = r#"
            SELECT tbl_name table_name, NULL owner, NULL last_analyzed
            FROM sqlite_master
            WHERE type = 'table' AND name LIKE :tab ESCAPE '\'
            ORDER BY 1
        "#;

        pub const FIND_VIEWS: &str = r#"
            SELECT tbl_name view_name, NULL owner, NULL view_type
            FROM sqlite_master
            WHERE type = 'view' AND name LIKE :view ESCAPE '\'
            ORDER BY 1
        "#;

        pub const DESCRIBE_TABLE: &str = "PRAGMA table_info({tab})";

        pub const GET_VERSION: &str = "SELECT sqlite_version() version";

        pub const LOAD_SAMPLE: &str =
            "SELECT * FROM {table} WHERE abs(random() % 1000000) < {pct} * 10000";

        pub const FIND_COLUMNS: &str = r#"
            SELECT NULL owner, m.name table_name, p.name column_name,
                   CASE p."notnull" WHEN 1 THEN 'N' ELSE 'Y' END nullable,
                   p.type data_type, NULL data_length
            FROM sqlite_master m
            JOIN pragma_table_info(m.name) p
            WHERE m.type = 'table' AND p.name LIKE :col ESCAPE '\'
            ORDER BY m.name, p.cid
        "#;

        pub const OBJECT_SOURCE: &str = r#"
            SELECT type object_type, name, sql ddl
            FROM sqlite_master
            WHERE type = LOWER(:object_type) AND name = :name COLLATE NOCASE
        "#;

        pub const GATHER_STATS: &str = "ANALYZE {tbl}";

        pub const EXPLAIN: &str = "EXPLAIN QUERY PLAN {sql}";
    }
}
