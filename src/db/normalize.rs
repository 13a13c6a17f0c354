//! Result normalization.
//!
//! Every backend hands back column names plus rows of [`Value`]s; this module
//! turns them into a [`ResultTable`] with unique machine names and readable
//! labels.

use crate::error::{DbError, DbResult};
use crate::models::{Column, ResultTable, Value};
use std::collections::HashSet;

/// Build a table from raw column names and rows.
///
/// Duplicate names get `_1`, `_2`, ... suffixes in first-seen order. Rows
/// whose width differs from the column count are rejected.
pub fn normalize(columns: Vec<String>, rows: Vec<Vec<Value>>) -> DbResult<ResultTable> {
    let names = dedupe_names(columns);
    if let Some((idx, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != names.len())
    {
        return Err(DbError::internal(format!(
            "row {} has {} values for {} columns",
            idx,
            row.len(),
            names.len()
        )));
    }

    let columns = names
        .into_iter()
        .map(|name| Column {
            label: display_label(&name),
            name,
        })
        .collect();
    Ok(ResultTable { columns, rows })
}

/// Make column names unique, keeping the first occurrence unchanged.
pub fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
    let mut seen: HashSet<String> = HashSet::new();

    names
        .into_iter()
        .map(|name| {
            let key = name.to_lowercase();
            if seen.insert(key.clone()) {
                return name;
            }
            let mut n = 1;
            loop {
                let candidate = format!("{name}_{n}");
                let candidate_key = candidate.to_lowercase();
                if !taken.contains(&candidate_key) {
                    taken.insert(candidate_key.clone());
                    seen.insert(candidate_key);
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

/// `last_analyzed` -> `Last Analyzed`, `TABLE_NAME` -> `Table Name`.
pub fn display_label(name: &str) -> String {
    name.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_duplicate_columns_suffixed() {
        assert_eq!(dedupe_names(names(&["x", "x", "x"])), names(&["x", "x_1", "x_2"]));
    }

    #[test]
    fn test_suffix_skips_existing_names() {
        assert_eq!(
            dedupe_names(names(&["x", "x_1", "x"])),
            names(&["x", "x_1", "x_2"])
        );
    }

    #[test]
    fn test_duplicates_are_case_insensitive() {
        assert_eq!(
            dedupe_names(names(&["OWNER", "owner"])),
            names(&["OWNER", "owner_1"])
        );
    }

    #[test]
    fn test_display_label() {
        assert_eq!(display_label("last_analyzed"), "Last Analyzed");
        assert_eq!(display_label("TABLE_NAME"), "Table Name");
        assert_eq!(display_label("sqlite_version()"), "Sqlite Version()");
        assert_eq!(display_label("cnt"), "Cnt");
    }

    #[test]
    fn test_normalize_keeps_nulls() {
        let table = normalize(
            names(&["owner", "table_name"]),
            vec![vec![Value::Null, Value::from("orders")]],
        )
        .unwrap();
        assert_eq!(table.columns[1].label, "Table Name");
        assert!(table.rows[0][0].is_null());
    }

    #[test]
    fn test_normalize_empty_result_keeps_columns() {
        let table = normalize(names(&["a", "b"]), Vec::new()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let err = normalize(names(&["a", "b"]), vec![vec![Value::Int(1)]]).unwrap_err();
        assert!(matches!(err, DbError::Internal { .. }));
    }
}
