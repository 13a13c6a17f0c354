//! Logical catalog operations and their fixed parameter signatures.

use serde::{Deserialize, Serialize};

/// A dialect-agnostic request kind.
///
/// Each operation declares the placeholder names every template registered
/// for it must use, whatever the dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    FindTables,
    FindViews,
    DescribeTable,
    ListIndexes,
    GetVersion,
    LoadSample,
    LoadTable,
    GroupedCount,
    FindColumns,
    FindPackages,
    FindFunctions,
    PackageFunctions,
    ObjectSource,
    TableStats,
    ColumnStats,
    GatherStats,
    Explain,
    CountMatchingRows,
}

impl Operation {
    pub const ALL: [Operation; 18] = [
        Operation::FindTables,
        Operation::FindViews,
        Operation::DescribeTable,
        Operation::ListIndexes,
        Operation::GetVersion,
        Operation::LoadSample,
        Operation::LoadTable,
        Operation::GroupedCount,
        Operation::FindColumns,
        Operation::FindPackages,
        Operation::FindFunctions,
        Operation::PackageFunctions,
        Operation::ObjectSource,
        Operation::TableStats,
        Operation::ColumnStats,
        Operation::GatherStats,
        Operation::Explain,
        Operation::CountMatchingRows,
    ];

    /// Placeholder names, sorted.
    pub fn parameters(&self) -> &'static [&'static str] {
        match self {
            Self::FindTables | Self::DescribeTable | Self::ListIndexes => &["tab"],
            Self::FindViews => &["view"],
            Self::GetVersion => &[],
            Self::LoadSample => &["pct", "table"],
            Self::LoadTable => &["table"],
            Self::GroupedCount => &[
                "group_by_clause",
                "order_by_clause",
                "select_list",
                "table",
                "where_clause",
            ],
            Self::FindColumns => &["col"],
            Self::FindPackages | Self::PackageFunctions => &["pkg"],
            Self::FindFunctions => &["func"],
            Self::ObjectSource => &["name", "object_type"],
            Self::TableStats | Self::ColumnStats | Self::GatherStats => &["tbl"],
            Self::Explain => &["sql"],
            Self::CountMatchingRows => &["col", "table", "val"],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FindTables => "find-tables",
            Self::FindViews => "find-views",
            Self::DescribeTable => "describe-table",
            Self::ListIndexes => "list-indexes",
            Self::GetVersion => "get-version",
            Self::LoadSample => "load-sample",
            Self::LoadTable => "load-table",
            Self::GroupedCount => "grouped-count",
            Self::FindColumns => "find-columns",
            Self::FindPackages => "find-packages",
            Self::FindFunctions => "find-functions",
            Self::PackageFunctions => "package-functions",
            Self::ObjectSource => "object-source",
            Self::TableStats => "table-stats",
            Self::ColumnStats => "column-stats",
            Self::GatherStats => "gather-stats",
            Self::Explain => "explain",
            Self::CountMatchingRows => "count-matching-rows",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_are_sorted_and_unique() {
        for op in Operation::ALL {
            let params = op.parameters();
            assert!(
                params.windows(2).all(|w| w[0] < w[1]),
                "{op} parameters not sorted: {params:?}"
            );
        }
    }

    #[test]
    fn test_all_is_exhaustive() {
        let mut names: Vec<_> = Operation::ALL.iter().map(|op| op.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Operation::ALL.len());
    }
}
