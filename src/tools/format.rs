//! Output formatting for result tables.
//!
//! This module provides the output format type and the rendering functions
//! used by every shell command that prints tabular data.

use crate::models::{QueryOutcome, ResultTable, Value};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

/// Single-row results wider than this are printed transposed.
pub const TRANSPOSE_MIN_COLUMNS: usize = 4;

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ASCII table format (like MySQL CLI)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// JSON array of row objects
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Render what a statement produced.
pub fn render_outcome(outcome: &QueryOutcome, format: OutputFormat, elapsed: Duration) -> String {
    match outcome {
        QueryOutcome::Rows(table) => render(table, format, elapsed),
        QueryOutcome::Done { rows_affected } => match format {
            OutputFormat::Json => format!("{{\"rows_affected\": {rows_affected}}}\n"),
            _ => {
                let row_text = if *rows_affected == 1 { "row" } else { "rows" };
                format!(
                    "Query OK, {} {} affected ({:.2} sec)\n",
                    rows_affected,
                    row_text,
                    elapsed.as_secs_f64()
                )
            }
        },
    }
}

pub fn render(table: &ResultTable, format: OutputFormat, elapsed: Duration) -> String {
    match format {
        OutputFormat::Table => {
            if table.row_count() == 1 && table.columns.len() >= TRANSPOSE_MIN_COLUMNS {
                format_as_table(&table.transpose(), 1, elapsed)
            } else {
                format_as_table(table, table.row_count(), elapsed)
            }
        }
        OutputFormat::Markdown => format_as_markdown(table),
        OutputFormat::Json => format_as_json(table),
    }
}

pub fn format_value(value: &Value) -> String {
    value.to_string()
}

fn pad_left(text: &str, width: usize) -> String {
    format!("{}{}", " ".repeat(width.saturating_sub(text.width())), text)
}

fn pad_right(text: &str, width: usize) -> String {
    format!("{}{}", text, " ".repeat(width.saturating_sub(text.width())))
}

fn pad_center(text: &str, width: usize) -> String {
    let gap = width.saturating_sub(text.width());
    let left = gap / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(gap - left))
}

/// `row_count` is reported in the footer; it differs from the printed row
/// count when the table was transposed.
pub fn format_as_table(table: &ResultTable, row_count: usize, elapsed: Duration) -> String {
    if table.is_empty() {
        return format!("Empty set ({:.2} sec)\n", elapsed.as_secs_f64());
    }

    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(format_value).collect())
        .collect();

    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.label.width()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            // Multi-line values (DDL source) count by their longest line
            let cell_width = cell.lines().map(|l| l.width()).max().unwrap_or(0);
            widths[i] = widths[i].max(cell_width);
        }
    }

    let mut output = String::new();
    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    output.push_str(&separator);
    let header: String = table
        .columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {} ", pad_center(&col.label, *w)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for (row, values) in cells.iter().zip(&table.rows) {
        let height = row.iter().map(|c| c.lines().count().max(1)).max().unwrap_or(1);
        for line_idx in 0..height {
            let line: String = row
                .iter()
                .zip(values)
                .zip(&widths)
                .map(|((cell, value), w)| {
                    let text = cell.lines().nth(line_idx).unwrap_or("");
                    if value.is_numeric() {
                        format!("| {} ", pad_left(text, *w))
                    } else {
                        format!("| {} ", pad_right(text, *w))
                    }
                })
                .collect::<String>()
                + "|\n";
            output.push_str(&line);
        }
    }

    output.push_str(&separator);

    let row_text = if row_count == 1 { "row" } else { "rows" };
    output.push_str(&format!(
        "{} {} in set ({:.2} sec)\n",
        row_count,
        row_text,
        elapsed.as_secs_f64()
    ));

    output
}

pub fn format_as_markdown(table: &ResultTable) -> String {
    if table.is_empty() {
        return "*Empty set*\n".to_string();
    }

    let mut output = String::new();

    let header: String = table
        .columns
        .iter()
        .map(|c| format!("| {} ", c.label))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);

    let sep: String = table.columns.iter().map(|_| "|---").collect::<String>() + "|\n";
    output.push_str(&sep);

    for row in &table.rows {
        let row_str: String = row
            .iter()
            .map(|value| {
                let text = format_value(value).replace('|', "\\|").replace('\n', "<br>");
                format!("| {} ", text)
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&format!("\n*{} rows*\n", table.row_count()));

    output
}

pub fn format_as_json(table: &ResultTable) -> String {
    let mut out = serde_json::to_string_pretty(&table.to_json_rows()).unwrap_or_default();
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::normalize;

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultTable {
        normalize(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn test_table_format_layout() {
        let t = table(
            &["table_name", "cnt"],
            vec![
                vec![Value::from("orders"), Value::Int(12)],
                vec![Value::from("customers"), Value::Null],
            ],
        );
        let out = format_as_table(&t, t.row_count(), Duration::from_millis(250));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "+------------+------+");
        assert_eq!(lines[1], "| Table Name | Cnt  |");
        assert_eq!(lines[3], "| orders     |   12 |");
        assert_eq!(lines[4], "| customers  | NULL |");
        assert_eq!(lines[6], "2 rows in set (0.25 sec)");
    }

    #[test]
    fn test_empty_set() {
        let t = table(&["a"], Vec::new());
        assert!(render(&t, OutputFormat::Table, Duration::ZERO).starts_with("Empty set"));
        assert_eq!(format_as_markdown(&t), "*Empty set*\n");
        assert_eq!(format_as_json(&t), "[]\n");
    }

    #[test]
    fn test_wide_single_row_is_transposed() {
        let t = table(
            &["a", "b", "c", "d"],
            vec![vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]],
        );
        let out = render(&t, OutputFormat::Table, Duration::ZERO);
        // header plus one line per column
        assert_eq!(out.lines().filter(|l| l.starts_with("| ")).count(), 5);
        assert!(out.contains("1 row in set"));
    }

    #[test]
    fn test_markdown_escapes_pipes() {
        let t = table(&["expr"], vec![vec![Value::from("a|b")]]);
        let out = format_as_markdown(&t);
        assert!(out.contains("| a\\|b |"));
        assert!(out.contains("*1 rows*"));
    }

    #[test]
    fn test_json_rows() {
        let t = table(&["id", "name"], vec![vec![Value::Int(1), Value::Null]]);
        let parsed: serde_json::Value = serde_json::from_str(&format_as_json(&t)).unwrap();
        assert_eq!(parsed[0]["id"], 1);
        assert!(parsed[0]["name"].is_null());
    }

    #[test]
    fn test_command_outcome() {
        let out = render_outcome(
            &QueryOutcome::Done { rows_affected: 3 },
            OutputFormat::Table,
            Duration::from_millis(10),
        );
        assert_eq!(out, "Query OK, 3 rows affected (0.01 sec)\n");
    }
}
