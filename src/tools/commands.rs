//! Shell command grammar and dispatch.
//!
//! Each input line is one command. Lines are split shell-style and parsed
//! with clap; `sql` and `explain` keep their statement text verbatim so SQL
//! quoting survives.

use crate::credentials::AliasTarget;
use crate::db::binder::{AggregateSpec, GroupedCount, NameMatch, Request};
use crate::db::normalize;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, Value};
use crate::tools::format::{OutputFormat, render, render_outcome};
use crate::tools::session::Session;
use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::path::Path;
use std::time::Instant;

/// Options shared by every query command.
#[derive(Debug, Clone, Default, PartialEq, Args)]
pub struct TargetArgs {
    /// Run on ALIAS[.schema] instead of the default connection
    #[arg(short = 'd', long = "db-alias", value_name = "ALIAS")]
    pub db_alias: Option<String>,

    /// Output format for this command
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

impl TargetArgs {
    fn target(&self) -> DbResult<Option<AliasTarget>> {
        self.db_alias.as_deref().map(str::parse).transpose()
    }
}

/// Name argument with the exact-match switch.
#[derive(Debug, Clone, PartialEq, Args)]
pub struct NameArgs {
    /// Name or name fragment
    pub name: String,

    /// Match the name exactly instead of as a substring
    #[arg(short, long)]
    pub exact: bool,
}

impl NameArgs {
    fn to_match(&self) -> NameMatch {
        NameMatch::new(&self.name, self.exact)
    }
}

#[derive(Debug, Parser)]
#[command(no_binary_name = true, name = "", disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum ShellCommand {
    /// List aliases from the alias file
    Aliases {
        filter: Option<String>,
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Show or change the default connection (ALIAS[.schema])
    Use { target: Option<String> },
    /// Find tables by name
    Tables {
        #[command(flatten)]
        name: NameArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Find views by name
    Views {
        #[command(flatten)]
        name: NameArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Describe a table's columns
    #[command(visible_alias = "describe")]
    Desc {
        #[command(flatten)]
        name: NameArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Find columns by name
    Columns {
        #[command(flatten)]
        name: NameArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List a table's indexes
    Indexes {
        #[command(flatten)]
        name: NameArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Show the server version
    Version {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Row counts grouped by columns, with optional aggregates
    Counts {
        table: String,
        /// Columns to group by
        columns: Vec<String>,
        #[arg(long = "cnt-distinct", visible_alias = "distinct-cnt", value_name = "COL")]
        cnt_distinct: Vec<String>,
        #[arg(long, value_name = "COL")]
        count: Vec<String>,
        #[arg(long, value_name = "COL")]
        sum: Vec<String>,
        #[arg(long, value_name = "COL")]
        avg: Vec<String>,
        #[arg(long, value_name = "COL")]
        min: Vec<String>,
        #[arg(long, value_name = "COL")]
        max: Vec<String>,
        /// WHERE predicate; repeat to AND several
        #[arg(long, num_args = 1.., value_name = "PREDICATE")]
        filter: Vec<String>,
        /// 1-based output column to sort by (default: last)
        #[arg(long)]
        sort: Option<usize>,
        /// Sort ascending
        #[arg(long)]
        asc: bool,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Load a table, or a random percentage of it
    #[command(visible_alias = "load")]
    Sample {
        table: String,
        /// Schema qualifier
        #[arg(short, long)]
        schema: Option<String>,
        /// Percentage of rows to sample
        #[arg(short = 'r', long = "random-sample-size", value_name = "PCT")]
        percent: Option<f64>,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Run SQL text, or the SQL in a file; `:name` binds come from `set` or a prompt
    Sql {
        /// Commit when no transaction is open (default: roll back)
        #[arg(long)]
        commit: bool,
        #[command(flatten)]
        target: TargetArgs,
        sql: String,
    },
    /// Open a transaction on the default connection
    Begin,
    /// Commit the open transaction
    Commit,
    /// Roll back the open transaction
    Rollback,
    /// Set a bind variable
    Set {
        name: String,
        value: String,
        /// Keep the value as text even if it looks numeric
        #[arg(short, long)]
        string: bool,
    },
    /// Show bind variables
    Vars,
    /// Find PL/SQL packages by name
    Packages {
        #[command(flatten)]
        name: NameArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Find functions and procedures by name
    Functions {
        #[command(flatten)]
        name: NameArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List a package's functions with their arguments
    Package {
        name: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Show an object's DDL source
    Source {
        name: String,
        #[arg(short = 't', long = "type", default_value = "TABLE")]
        object_type: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Show table statistics, or column statistics with --columns
    Stats {
        table: String,
        #[arg(long)]
        columns: bool,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Gather optimizer statistics for a table
    GatherStats {
        table: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Show the execution plan of a statement
    Explain {
        #[command(flatten)]
        target: TargetArgs,
        sql: String,
    },
    /// Find tables having COLUMN with a row equal to VALUE
    FindValue {
        column: String,
        value: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Leave the shell
    #[command(visible_aliases = ["exit", "\\q"])]
    Quit,
}

/// What the shell should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    /// Print the text and read the next command.
    Continue(String),
    Quit,
}

/// Parse one input line. `Ok(None)` for blank lines and comments.
///
/// Help requests and usage errors come back as `Usage` carrying clap's
/// rendered text.
pub fn parse_line(line: &str) -> DbResult<Option<ShellCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with("--") {
        return Ok(None);
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    let argv = if head.starts_with('\\') {
        // backslash commands like `\q` keep their leading backslash
        let mut argv = split_words(rest)?;
        argv.insert(0, head.to_string());
        argv
    } else if head == "sql" || head == "explain" {
        let (mut options, statement) = split_leading_options(rest)?;
        options.insert(0, head.to_string());
        options.push("--".to_string());
        options.push(statement.trim_end_matches(';').trim().to_string());
        options
    } else {
        split_words(line)?
    };

    let usage = |e: clap::Error| DbError::usage(e.render().to_string().trim_end());
    let matches = ShellLine::command().try_get_matches_from(argv).map_err(usage)?;
    let mut command = ShellLine::from_arg_matches(&matches).map_err(usage)?.command;

    // Each --filter occurrence is one predicate made of all its words
    if let ShellCommand::Counts { filter, .. } = &mut command
        && let Some(("counts", sub)) = matches.subcommand()
        && let Some(occurrences) = sub.get_occurrences::<String>("filter")
    {
        *filter = occurrences
            .map(|words| words.map(String::as_str).collect::<Vec<_>>().join(" "))
            .collect();
    }
    Ok(Some(command))
}

/// Split shell-style: whitespace separates words, quotes group them.
pub fn split_words(line: &str) -> DbResult<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_word = true;
            }
            None if c == '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                    in_word = true;
                }
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(DbError::invalid_input("unterminated quote"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Peel `--commit`, `-d ALIAS` and `-f FORMAT` off the front of `sql`/`explain`
/// arguments; the remainder is the statement text, untouched.
fn split_leading_options(rest: &str) -> DbResult<(Vec<String>, &str)> {
    const WITH_VALUE: &[&str] = &["-d", "--db-alias", "-f", "--format"];
    let mut options = Vec::new();
    let mut remaining = rest.trim_start();

    loop {
        let Some(word) = remaining.split_whitespace().next() else {
            break;
        };
        if !word.starts_with('-') {
            break;
        }
        if word == "-h" || word == "--help" || word == "--commit" {
            options.push(word.to_string());
            remaining = remaining[word.len()..].trim_start();
            continue;
        }
        if WITH_VALUE.contains(&word) {
            remaining = remaining[word.len()..].trim_start();
            let value = remaining.split_whitespace().next().ok_or_else(|| {
                DbError::invalid_input(format!("option {word} needs a value"))
            })?;
            options.push(word.to_string());
            options.push(value.to_string());
            remaining = remaining[value.len()..].trim_start();
            continue;
        }
        // `--` comments and negative literals belong to the statement
        break;
    }
    Ok((options, remaining))
}

/// Typed value from user input: NULL, integer, float, else text.
pub fn parse_value(text: &str, force_text: bool) -> QueryParam {
    if force_text {
        return QueryParam::String(text.to_string());
    }
    if text.eq_ignore_ascii_case("null") {
        return QueryParam::Null;
    }
    if let Ok(v) = text.parse::<i64>() {
        return QueryParam::Int(v);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => QueryParam::Float(v),
        _ => QueryParam::String(text.to_string()),
    }
}

fn read_sql(text: &str) -> DbResult<String> {
    let path = Path::new(text);
    if !text.contains('\n') && path.is_file() {
        return std::fs::read_to_string(path).map_err(|e| {
            DbError::invalid_input(format!("cannot read SQL file {}: {e}", path.display()))
        });
    }
    Ok(text.to_string())
}

/// Execute one command against the session.
///
/// `ask` supplies values for bind variables that are not set.
pub async fn execute<F>(
    session: &mut Session,
    command: ShellCommand,
    default_format: OutputFormat,
    ask: F,
) -> DbResult<Control>
where
    F: FnMut(&str) -> Option<String>,
{
    let started = Instant::now();
    let output = match command {
        ShellCommand::Aliases { filter, format } => {
            let table = session.aliases(filter.as_deref())?;
            render(&table, format.unwrap_or(default_format), started.elapsed())
        }
        ShellCommand::Use { target: None } => {
            format!("Default connection: {} ({})\n", session.label(), session.dialect())
        }
        ShellCommand::Use {
            target: Some(target),
        } => {
            session.switch(&target.parse()?).await?;
            format!("Default connection: {} ({})\n", session.label(), session.dialect())
        }
        ShellCommand::Tables { name, target } => {
            run(session, &target, default_format, Request::FindTables(name.to_match())).await?
        }
        ShellCommand::Views { name, target } => {
            run(session, &target, default_format, Request::FindViews(name.to_match())).await?
        }
        ShellCommand::Desc { name, target } => {
            run(session, &target, default_format, Request::DescribeTable(name.to_match())).await?
        }
        ShellCommand::Columns { name, target } => {
            run(session, &target, default_format, Request::FindColumns(name.to_match())).await?
        }
        ShellCommand::Indexes { name, target } => {
            run(session, &target, default_format, Request::ListIndexes(name.to_match())).await?
        }
        ShellCommand::Version { target } => {
            run(session, &target, default_format, Request::GetVersion).await?
        }
        ShellCommand::Counts {
            table,
            columns,
            cnt_distinct,
            count,
            sum,
            avg,
            min,
            max,
            filter,
            sort,
            asc,
            target,
        } => {
            let mut request = GroupedCount::new(table).group_by(columns);
            let aggregates = [
                ("cnt_distinct", cnt_distinct),
                ("count", count),
                ("sum", sum),
                ("avg", avg),
                ("min", min),
                ("max", max),
            ];
            for (kind, cols) in aggregates {
                for col in cols {
                    request = request.aggregate(AggregateSpec::new(kind, col)?);
                }
            }
            for predicate in filter {
                request = request.filter(predicate);
            }
            if let Some(sort) = sort {
                request = request.sort_by(sort, asc);
            } else {
                request.ascending = asc;
            }
            run(session, &target, default_format, Request::GroupedCount(request)).await?
        }
        ShellCommand::Sample {
            table,
            schema,
            percent,
            target,
        } => {
            let table = match schema {
                Some(schema) => format!("{schema}.{table}"),
                None => table,
            };
            let request = match percent {
                Some(percent) => Request::LoadSample { table, percent },
                None => Request::LoadTable { table },
            };
            run(session, &target, default_format, request).await?
        }
        ShellCommand::Sql {
            commit,
            target,
            sql,
        } => {
            let sql = read_sql(&sql)?;
            let outcome = session
                .execute_sql(&sql, commit, target.target()?.as_ref(), ask)
                .await?;
            render_outcome(&outcome, target.format.unwrap_or(default_format), started.elapsed())
        }
        ShellCommand::Begin => {
            session.begin().await?;
            "Transaction started\n".to_string()
        }
        ShellCommand::Commit => {
            session.commit().await?;
            "Committed\n".to_string()
        }
        ShellCommand::Rollback => {
            session.rollback().await?;
            "Rolled back\n".to_string()
        }
        ShellCommand::Set {
            name,
            value,
            string,
        } => {
            let value = parse_value(&value, string);
            let shown = value.to_string();
            session.set_variable(&name, value)?;
            format!(":{} = {}\n", name.trim_start_matches(':'), shown)
        }
        ShellCommand::Vars => {
            let rows = session
                .variables()
                .iter()
                .map(|(name, value)| {
                    vec![
                        Value::Text(name.clone()),
                        Value::Text(value.to_string()),
                        Value::from(value.type_name()),
                    ]
                })
                .collect();
            let table = normalize(
                vec!["name".to_string(), "value".to_string(), "type".to_string()],
                rows,
            )?;
            render(&table, default_format, started.elapsed())
        }
        ShellCommand::Packages { name, target } => {
            run(session, &target, default_format, Request::FindPackages(name.to_match())).await?
        }
        ShellCommand::Functions { name, target } => {
            run(session, &target, default_format, Request::FindFunctions(name.to_match())).await?
        }
        ShellCommand::Package { name, target } => {
            run(session, &target, default_format, Request::PackageFunctions { package: name }).await?
        }
        ShellCommand::Source {
            name,
            object_type,
            target,
        } => {
            run(session, &target, default_format, Request::ObjectSource { object_type, name }).await?
        }
        ShellCommand::Stats {
            table,
            columns,
            target,
        } => {
            let request = if columns {
                Request::ColumnStats { table }
            } else {
                Request::TableStats { table }
            };
            run(session, &target, default_format, request).await?
        }
        ShellCommand::GatherStats { table, target } => {
            run(session, &target, default_format, Request::GatherStats { table }).await?
        }
        ShellCommand::Explain { target, sql } => {
            let sql = read_sql(&sql)?;
            run(session, &target, default_format, Request::Explain { sql }).await?
        }
        ShellCommand::FindValue {
            column,
            value,
            target,
        } => {
            if target.db_alias.is_some() {
                return Err(DbError::invalid_input(
                    "find-value runs on the default connection; switch with `use` first",
                ));
            }
            let table = session
                .find_tables_by_column_value(&column, parse_value(&value, false))
                .await?;
            render(&table, target.format.unwrap_or(default_format), started.elapsed())
        }
        ShellCommand::Quit => return Ok(Control::Quit),
    };
    Ok(Control::Continue(output))
}

async fn run(
    session: &mut Session,
    target: &TargetArgs,
    default_format: OutputFormat,
    request: Request,
) -> DbResult<String> {
    let started = Instant::now();
    let outcome = session.run_on(target.target()?.as_ref(), &request).await?;
    Ok(render_outcome(
        &outcome,
        target.format.unwrap_or(default_format),
        started.elapsed(),
    ))
}
