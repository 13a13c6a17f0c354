//! Parameter binding: logical requests to executable queries.
//!
//! A [`Request`] is turned into named [`Args`], which are matched against a
//! template's placeholders. `:name` placeholders become driver binds;
//! `{name}` placeholders are filled with validated text. Only bound values
//! are injection-safe: filter fragments and raw SQL given to `explain` are
//! interpolated as-is.

use crate::db::placeholders::{Segment, SqlText};
use crate::db::templates::{QueryTemplate, TemplateLibrary};
use crate::error::{DbError, DbResult};
use crate::models::{BoundQuery, Dialect, Operation, QueryParam, StatementKind};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use tracing::debug;

/// Maximum dot-separated parts in an identifier (`db.schema.table`).
const MAX_IDENTIFIER_PARTS: usize = 3;

/// A value supplied for one placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Scalar value. Bound by the driver; only numbers and NULL may fill a text slot.
    Value(QueryParam),
    /// Object name. Bound as `pattern`, interpolated as the validated `ident`.
    Name { ident: String, pattern: String },
    /// Trusted SQL text. Interpolation only.
    Fragment(String),
}

/// Named arguments for a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(BTreeMap<String, Arg>);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, arg: Arg) -> Self {
        self.0.insert(name.to_string(), arg);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.0.get(name)
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.0.keys().cloned().collect()
    }
}

/// Check an identifier: dot-separated parts of `[A-Za-z_][A-Za-z0-9_$#]*`.
pub fn validate_identifier(ident: &str) -> DbResult<()> {
    let parts: Vec<&str> = ident.split('.').collect();
    let valid = parts.len() <= MAX_IDENTIFIER_PARTS
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#')
        });
    if valid {
        Ok(())
    } else {
        Err(DbError::invalid_input(format!(
            "'{ident}' is not a valid identifier"
        )))
    }
}

// =============================================================================
// Logical Arguments
// =============================================================================

/// An object name lookup.
///
/// By default the match is a case-insensitive substring (`%NAME%`); with
/// `exact` the name is bound with its LIKE wildcards escaped, so `_` and `%`
/// only match themselves. Templates use `\` as the LIKE escape character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pub name: String,
    pub exact: bool,
}

impl NameMatch {
    pub fn new(name: impl Into<String>, exact: bool) -> Self {
        Self {
            name: name.into(),
            exact,
        }
    }

    pub fn substring(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    pub fn exact(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    pub fn pattern(&self) -> String {
        if self.exact {
            escape_like(&self.name)
        } else {
            format!("%{}%", self.name.to_uppercase())
        }
    }

    pub fn to_arg(&self) -> Arg {
        Arg::Name {
            ident: self.name.clone(),
            pattern: self.pattern(),
        }
    }

    /// Bind the name unchanged, for templates that compare with `=`.
    pub fn literal_arg(name: &str) -> Arg {
        Arg::Name {
            ident: name.to_string(),
            pattern: name.to_string(),
        }
    }
}

/// Escape `\`, `%` and `_` so a LIKE pattern matches the text literally.
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Aggregate functions accepted by grouped counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    CountDistinct,
}

impl AggregateKind {
    fn function(&self) -> &'static str {
        match self {
            Self::Count | Self::CountDistinct => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

impl FromStr for AggregateKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" | "cnt" => Ok(Self::Count),
            "sum" => Ok(Self::Sum),
            "avg" | "mean" => Ok(Self::Avg),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "count_distinct" | "cnt_distinct" | "distinct_cnt" | "count-distinct" => {
                Ok(Self::CountDistinct)
            }
            _ => Err(DbError::invalid_aggregate(s)),
        }
    }
}

/// An aggregate over one column, e.g. `sum(amount) sum_amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSpec {
    pub kind: AggregateKind,
    pub column: String,
}

impl AggregateSpec {
    pub fn new(kind: &str, column: impl Into<String>) -> DbResult<Self> {
        Ok(Self {
            kind: kind.parse()?,
            column: column.into(),
        })
    }

    /// Parse `kind:column`, e.g. `sum:amount`.
    pub fn parse(spec: &str) -> DbResult<Self> {
        match spec.split_once(':') {
            Some((kind, column)) if !column.trim().is_empty() => Self::new(kind, column.trim()),
            _ => Err(DbError::invalid_aggregate(spec)),
        }
    }

    fn render(&self) -> DbResult<String> {
        validate_identifier(&self.column)?;
        let alias = self.column.replace('.', "_");
        let func = self.kind.function();
        Ok(match self.kind {
            AggregateKind::CountDistinct => {
                format!("{func}(DISTINCT {}) distinct_{alias}", self.column)
            }
            _ => format!("{func}({}) {func}_{alias}", self.column),
        })
    }
}

/// Row counts grouped by columns, with optional aggregates and filters.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedCount {
    pub table: String,
    pub columns: Vec<String>,
    pub aggregates: Vec<AggregateSpec>,
    /// Raw SQL predicates, AND-joined
    pub filters: Vec<String>,
    /// 1-based output column; defaults to the last one
    pub sort_column: Option<usize>,
    pub ascending: bool,
}

impl GroupedCount {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            aggregates: Vec::new(),
            filters: Vec::new(),
            sort_column: None,
            ascending: false,
        }
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn aggregate(mut self, spec: AggregateSpec) -> Self {
        self.aggregates.push(spec);
        self
    }

    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.filters.push(predicate.into());
        self
    }

    pub fn sort_by(mut self, column: usize, ascending: bool) -> Self {
        self.sort_column = Some(column);
        self.ascending = ascending;
        self
    }

    /// Number of columns the query returns.
    pub fn output_width(&self) -> usize {
        self.columns.len() + self.aggregates.len().max(1)
    }

    fn select_list(&self) -> DbResult<String> {
        let mut items = Vec::with_capacity(self.output_width());
        for column in &self.columns {
            validate_identifier(column)?;
            items.push(column.clone());
        }
        if self.aggregates.is_empty() {
            items.push("count(1) cnt".to_string());
        } else {
            for spec in &self.aggregates {
                items.push(spec.render()?);
            }
        }
        Ok(items.join(", "))
    }

    fn where_clause(&self) -> String {
        let predicates: Vec<String> = self
            .filters
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(|f| format!("({f})"))
            .collect();
        if predicates.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", predicates.join(" AND "))
        }
    }

    fn group_by_clause(&self) -> String {
        if self.columns.is_empty() {
            String::new()
        } else {
            format!(" GROUP BY {}", self.columns.join(", "))
        }
    }

    fn order_by_clause(&self) -> DbResult<String> {
        // a single aggregate row needs no ordering
        if self.columns.is_empty() {
            return Ok(String::new());
        }
        let width = self.output_width();
        let column = self.sort_column.unwrap_or(width);
        if column == 0 || column > width {
            return Err(DbError::invalid_input(format!(
                "sort column {column} is outside the {width} output columns"
            )));
        }
        let direction = if self.ascending { "ASC" } else { "DESC" };
        Ok(format!(" ORDER BY {column} {direction}"))
    }

    fn args(&self) -> DbResult<Args> {
        Ok(Args::new()
            .with("select_list", Arg::Fragment(self.select_list()?))
            .with("table", NameMatch::exact(&self.table).to_arg())
            .with("where_clause", Arg::Fragment(self.where_clause()))
            .with("group_by_clause", Arg::Fragment(self.group_by_clause()))
            .with("order_by_clause", Arg::Fragment(self.order_by_clause()?)))
    }
}

/// A dialect-agnostic request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    FindTables(NameMatch),
    FindViews(NameMatch),
    DescribeTable(NameMatch),
    ListIndexes(NameMatch),
    GetVersion,
    LoadSample { table: String, percent: f64 },
    LoadTable { table: String },
    GroupedCount(GroupedCount),
    FindColumns(NameMatch),
    FindPackages(NameMatch),
    FindFunctions(NameMatch),
    PackageFunctions { package: String },
    ObjectSource { object_type: String, name: String },
    TableStats { table: String },
    ColumnStats { table: String },
    GatherStats { table: String },
    Explain { sql: String },
    CountMatchingRows {
        table: String,
        column: String,
        value: QueryParam,
    },
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Self::FindTables(_) => Operation::FindTables,
            Self::FindViews(_) => Operation::FindViews,
            Self::DescribeTable(_) => Operation::DescribeTable,
            Self::ListIndexes(_) => Operation::ListIndexes,
            Self::GetVersion => Operation::GetVersion,
            // Oracle rejects SAMPLE(100); a full sample is the whole table
            Self::LoadSample { percent, .. } if *percent >= 100.0 => Operation::LoadTable,
            Self::LoadSample { .. } => Operation::LoadSample,
            Self::LoadTable { .. } => Operation::LoadTable,
            Self::GroupedCount(_) => Operation::GroupedCount,
            Self::FindColumns(_) => Operation::FindColumns,
            Self::FindPackages(_) => Operation::FindPackages,
            Self::FindFunctions(_) => Operation::FindFunctions,
            Self::PackageFunctions { .. } => Operation::PackageFunctions,
            Self::ObjectSource { .. } => Operation::ObjectSource,
            Self::TableStats { .. } => Operation::TableStats,
            Self::ColumnStats { .. } => Operation::ColumnStats,
            Self::GatherStats { .. } => Operation::GatherStats,
            Self::Explain { .. } => Operation::Explain,
            Self::CountMatchingRows { .. } => Operation::CountMatchingRows,
        }
    }

    /// Map logical arguments onto the operation's placeholder names.
    pub fn args(&self) -> DbResult<Args> {
        let args = match self {
            Self::FindTables(m) | Self::DescribeTable(m) | Self::ListIndexes(m) => {
                Args::new().with("tab", m.to_arg())
            }
            Self::FindViews(m) => Args::new().with("view", m.to_arg()),
            Self::FindColumns(m) => Args::new().with("col", m.to_arg()),
            Self::FindPackages(m) => Args::new().with("pkg", m.to_arg()),
            Self::FindFunctions(m) => Args::new().with("func", m.to_arg()),
            Self::GetVersion => Args::new(),
            Self::LoadSample { table, percent } => {
                if !(*percent > 0.0 && *percent <= 100.0) {
                    return Err(DbError::invalid_input(format!(
                        "sample percentage must be in (0, 100], got {percent}"
                    )));
                }
                if *percent >= 100.0 {
                    return Ok(Args::new().with("table", NameMatch::exact(table).to_arg()));
                }
                Args::new()
                    .with("table", NameMatch::exact(table).to_arg())
                    .with("pct", Arg::Value(QueryParam::Float(*percent)))
            }
            Self::LoadTable { table } => {
                Args::new().with("table", NameMatch::exact(table).to_arg())
            }
            Self::GroupedCount(gc) => gc.args()?,
            Self::PackageFunctions { package } => {
                Args::new().with("pkg", NameMatch::exact(package).to_arg())
            }
            Self::ObjectSource { object_type, name } => Args::new()
                .with(
                    "object_type",
                    Arg::Value(QueryParam::String(object_type.to_uppercase())),
                )
                .with("name", Arg::Value(QueryParam::String(name.clone()))),
            Self::TableStats { table } | Self::ColumnStats { table } | Self::GatherStats { table } => {
                Args::new().with("tbl", NameMatch::literal_arg(table))
            }
            Self::Explain { sql } => {
                let sql = sql.trim().trim_end_matches(';').trim();
                if sql.is_empty() {
                    return Err(DbError::invalid_input("nothing to explain"));
                }
                Args::new().with("sql", Arg::Fragment(sql.to_string()))
            }
            Self::CountMatchingRows {
                table,
                column,
                value,
            } => Args::new()
                .with("table", NameMatch::exact(table).to_arg())
                .with("col", NameMatch::exact(column).to_arg())
                .with("val", Arg::Value(value.clone())),
        };
        Ok(args)
    }
}

// =============================================================================
// Binding
// =============================================================================

/// Render a request for a dialect.
pub fn prepare(
    library: &TemplateLibrary,
    dialect: Dialect,
    request: &Request,
) -> DbResult<BoundQuery> {
    let template = library.template_for(request.operation(), dialect)?;
    let args = request.args()?;
    bind(template, &args)
}

/// Fill a template's placeholders from `args`.
///
/// The argument names must equal the template's placeholder names exactly.
pub fn bind(template: &QueryTemplate, args: &Args) -> DbResult<BoundQuery> {
    let expected = template.placeholder_names();
    let supplied = args.names();
    if expected != supplied {
        let missing: Vec<_> = expected.difference(&supplied).collect();
        let extra: Vec<_> = supplied.difference(&expected).collect();
        return Err(DbError::template(format!(
            "{} on {}: missing arguments {:?}, unexpected arguments {:?}",
            template.operation, template.dialect, missing, extra
        )));
    }

    let mut bound = render(&template.text, template.dialect, args, template.kind)?;
    bound.follow_up = template.follow_up.map(str::to_string);

    debug!(
        operation = %template.operation,
        dialect = %template.dialect,
        sql = %bound.sql,
        binds = ?bound.binds,
        "Bound query"
    );
    Ok(bound)
}

/// Bind user-supplied SQL whose `:name` placeholders are all in `values`.
pub fn bind_raw(
    text: &SqlText,
    dialect: Dialect,
    values: &BTreeMap<String, QueryParam>,
    kind: StatementKind,
) -> DbResult<BoundQuery> {
    let mut args = Args::new();
    for name in text.bind_names() {
        let value = values
            .get(&name)
            .ok_or_else(|| DbError::invalid_input(format!("no value for bind variable :{name}")))?;
        args = args.with(&name, Arg::Value(value.clone()));
    }
    render(text, dialect, &args, kind)
}

fn render(text: &SqlText, dialect: Dialect, args: &Args, kind: StatementKind) -> DbResult<BoundQuery> {
    let mut sql = String::new();
    let mut positional_sql = String::new();
    let mut binds: Vec<(String, QueryParam)> = Vec::new();
    let mut positional_params = Vec::new();

    for segment in text.segments() {
        match segment {
            Segment::Literal(s) => {
                sql.push_str(s);
                positional_sql.push_str(s);
            }
            Segment::Bind(name) => {
                let value = bind_value(name, lookup(args, name)?)?;
                sql.push(':');
                sql.push_str(name);
                positional_sql.push('?');
                if !binds.iter().any(|(n, _)| n == name) {
                    binds.push((name.clone(), value.clone()));
                }
                positional_params.push(value);
            }
            Segment::Slot(name) => {
                let text = slot_text(name, lookup(args, name)?, dialect)?;
                sql.push_str(&text);
                positional_sql.push_str(&text);
            }
        }
    }

    Ok(BoundQuery {
        sql: sql.trim().to_string(),
        binds,
        positional_sql: positional_sql.trim().to_string(),
        positional_params,
        kind,
        follow_up: None,
    })
}

fn lookup<'a>(args: &'a Args, name: &str) -> DbResult<&'a Arg> {
    args.get(name)
        .ok_or_else(|| DbError::template(format!("no argument for placeholder '{name}'")))
}

fn bind_value(name: &str, arg: &Arg) -> DbResult<QueryParam> {
    match arg {
        Arg::Value(v) => Ok(v.clone()),
        Arg::Name { pattern, .. } => Ok(QueryParam::String(pattern.clone())),
        Arg::Fragment(_) => Err(DbError::template(format!(
            "placeholder :{name} is a bind but was given a SQL fragment"
        ))),
    }
}

fn slot_text(name: &str, arg: &Arg, dialect: Dialect) -> DbResult<String> {
    match arg {
        Arg::Fragment(text) => Ok(text.clone()),
        Arg::Name { ident, .. } => {
            validate_identifier(ident)?;
            Ok(dialect.fold_identifier(ident))
        }
        Arg::Value(QueryParam::Int(v)) => Ok(v.to_string()),
        Arg::Value(QueryParam::Float(v)) if v.is_finite() => Ok(v.to_string()),
        Arg::Value(QueryParam::Null) => Ok("NULL".to_string()),
        Arg::Value(other) => Err(DbError::invalid_input(format!(
            "{{{name}}} only accepts numbers, got {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> TemplateLibrary {
        TemplateLibrary::builtin().unwrap()
    }

    #[test]
    fn test_name_match_patterns() {
        assert_eq!(NameMatch::substring("orders").pattern(), "%ORDERS%");
        assert_eq!(NameMatch::exact("Orders").pattern(), "Orders");
        assert_eq!(NameMatch::exact("customer_id").pattern(), "customer\\_id");
        assert_eq!(escape_like("100%\\x"), "100\\%\\\\x");
    }

    #[test]
    fn test_stats_bind_name_without_escapes() {
        let q = prepare(
            &library(),
            Dialect::Oracle,
            &Request::TableStats {
                table: "order_lines".into(),
            },
        )
        .unwrap();
        assert_eq!(q.bind_value("tbl"), Some(&QueryParam::from("order_lines")));
    }

    #[test]
    fn test_full_sample_loads_whole_table() {
        let request = Request::LoadSample {
            table: "orders".into(),
            percent: 100.0,
        };
        assert_eq!(request.operation(), Operation::LoadTable);
        let q = prepare(&library(), Dialect::Oracle, &request).unwrap();
        assert_eq!(q.sql, "SELECT * FROM ORDERS");
    }

    #[test]
    fn test_oracle_describe_binds_wildcard() {
        let q = prepare(
            &library(),
            Dialect::Oracle,
            &Request::DescribeTable(NameMatch::substring("ORDERS")),
        )
        .unwrap();
        assert!(q.sql.contains("LIKE UPPER(:tab)"));
        assert_eq!(q.binds, vec![("tab".to_string(), QueryParam::from("%ORDERS%"))]);
    }

    #[test]
    fn test_sqlite_describe_interpolates_folded_name() {
        let q = prepare(
            &library(),
            Dialect::SQLite,
            &Request::DescribeTable(NameMatch::substring("ORDERS")),
        )
        .unwrap();
        assert_eq!(q.sql, "PRAGMA table_info(orders)");
        assert!(!q.has_binds());
        assert!(q.positional_params.is_empty());
    }

    #[test]
    fn test_exact_match_binds_literal() {
        let q = prepare(
            &library(),
            Dialect::MySql,
            &Request::FindTables(NameMatch::exact("orders")),
        )
        .unwrap();
        assert_eq!(q.bind_value("tab"), Some(&QueryParam::from("orders")));
        assert!(q.positional_sql.contains("LIKE UPPER(?)"));
    }

    #[test]
    fn test_sqlite_describe_rejects_bad_identifier() {
        let err = prepare(
            &library(),
            Dialect::SQLite,
            &Request::DescribeTable(NameMatch::substring("x); DROP TABLE y; --")),
        )
        .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_grouped_count_without_columns() {
        let q = prepare(
            &library(),
            Dialect::SQLite,
            &Request::GroupedCount(GroupedCount::new("orders")),
        )
        .unwrap();
        assert_eq!(q.sql, "SELECT count(1) cnt FROM orders");
        assert!(!q.sql.contains("GROUP BY"));
        assert!(!q.sql.contains("ORDER BY"));
    }

    #[test]
    fn test_grouped_count_full() {
        let gc = GroupedCount::new("sales.orders")
            .group_by(["region", "status"])
            .aggregate(AggregateSpec::new("sum", "amount").unwrap())
            .aggregate(AggregateSpec::new("cnt_distinct", "customer_id").unwrap())
            .filter("amount > 0")
            .filter("status <> 'X'");
        let q = prepare(&library(), Dialect::MySql, &Request::GroupedCount(gc)).unwrap();
        assert_eq!(
            q.sql,
            "SELECT region, status, sum(amount) sum_amount, count(DISTINCT customer_id) distinct_customer_id \
             FROM sales.orders WHERE (amount > 0) AND (status <> 'X') GROUP BY region, status ORDER BY 4 DESC"
        );
        assert!(!q.has_binds());
    }

    #[test]
    fn test_grouped_count_sort_options() {
        let gc = GroupedCount::new("orders").group_by(["region"]).sort_by(1, true);
        let q = prepare(&library(), Dialect::Oracle, &Request::GroupedCount(gc)).unwrap();
        assert!(q.sql.ends_with("GROUP BY region ORDER BY 1 ASC"));

        let gc = GroupedCount::new("orders").group_by(["region"]).sort_by(3, true);
        let err = prepare(&library(), Dialect::Oracle, &Request::GroupedCount(gc)).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_unknown_aggregate() {
        let err = AggregateSpec::new("bogus", "amount").unwrap_err();
        assert!(matches!(err, DbError::InvalidAggregateSpec { ref spec } if spec == "bogus"));
        assert!(AggregateSpec::parse("amount").is_err());
        assert_eq!(
            AggregateSpec::parse("distinct_cnt:id").unwrap().kind,
            AggregateKind::CountDistinct
        );
    }

    #[test]
    fn test_unsupported_pair_yields_no_query() {
        let err = prepare(
            &library(),
            Dialect::SQLite,
            &Request::ListIndexes(NameMatch::substring("orders")),
        )
        .unwrap_err();
        assert!(matches!(err, DbError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_repeated_bind_positional_form() {
        let q = prepare(
            &library(),
            Dialect::Oracle,
            &Request::GatherStats {
                table: "scott.emp".into(),
            },
        )
        .unwrap();
        assert_eq!(q.kind, StatementKind::Command);
        assert_eq!(q.binds.len(), 1);
        assert_eq!(q.positional_params.len(), 4);
        assert_eq!(q.positional_sql.matches('?').count(), 4);
    }

    #[test]
    fn test_count_matching_rows_binds_value() {
        let q = prepare(
            &library(),
            Dialect::SQLite,
            &Request::CountMatchingRows {
                table: "main.orders".into(),
                column: "STATUS".into(),
                value: QueryParam::from("open"),
            },
        )
        .unwrap();
        assert_eq!(q.sql, "SELECT count(1) cnt FROM main.orders WHERE status = :val");
        assert_eq!(q.positional_params, vec![QueryParam::from("open")]);
    }

    #[test]
    fn test_load_sample_percent() {
        let q = prepare(
            &library(),
            Dialect::Oracle,
            &Request::LoadSample {
                table: "orders".into(),
                percent: 2.5,
            },
        )
        .unwrap();
        assert_eq!(q.sql, "SELECT * FROM ORDERS SAMPLE(2.5)");

        let err = Request::LoadSample {
            table: "orders".into(),
            percent: 0.0,
        }
        .args()
        .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_explain_strips_terminator() {
        let q = prepare(
            &library(),
            Dialect::SQLite,
            &Request::Explain {
                sql: "select * from t;".into(),
            },
        )
        .unwrap();
        assert_eq!(q.sql, "EXPLAIN QUERY PLAN select * from t");
        assert!(q.follow_up.is_none());
    }

    #[test]
    fn test_fragment_cannot_be_bound() {
        let lib = library();
        let template = lib.template_for(Operation::FindTables, Dialect::SQLite).unwrap();
        let args = Args::new().with("tab", Arg::Fragment("x".into()));
        assert!(matches!(bind(template, &args), Err(DbError::Template { .. })));
    }

    #[test]
    fn test_missing_argument_rejected() {
        let lib = library();
        let template = lib.template_for(Operation::LoadSample, Dialect::MySql).unwrap();
        let args = Args::new().with("table", NameMatch::exact("t").to_arg());
        let err = bind(template, &args).unwrap_err();
        assert!(err.to_string().contains("pct"));
    }

    #[test]
    fn test_text_value_rejected_in_slot() {
        let lib = library();
        let template = lib.template_for(Operation::LoadSample, Dialect::MySql).unwrap();
        let args = Args::new()
            .with("table", NameMatch::exact("t").to_arg())
            .with("pct", Arg::Value(QueryParam::from("1; drop table t")));
        assert!(matches!(bind(template, &args), Err(DbError::InvalidInput { .. })));
    }

    #[test]
    fn test_bind_raw_requires_every_value() {
        let text = SqlText::raw("SELECT * FROM t WHERE a = :a AND b = :b AND c = :a");
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), QueryParam::Int(1));
        assert!(bind_raw(&text, Dialect::SQLite, &values, StatementKind::Query).is_err());

        values.insert("b".to_string(), QueryParam::from("x"));
        let q = bind_raw(&text, Dialect::SQLite, &values, StatementKind::Query).unwrap();
        assert_eq!(q.positional_sql, "SELECT * FROM t WHERE a = ? AND b = ? AND c = ?");
        assert_eq!(
            q.positional_params,
            vec![QueryParam::Int(1), QueryParam::from("x"), QueryParam::Int(1)]
        );
        assert_eq!(q.bind_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("orders").is_ok());
        assert!(validate_identifier("scott.emp$hist").is_ok());
        assert!(validate_identifier("a.b.c.d").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("a b").is_err());
    }
}
