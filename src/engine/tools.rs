use crate::engine::csv;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// Local transformations applied to the active table without a round trip to
/// the assistant. Columns are addressed by index into the header row.
#[derive(Debug, Clone, PartialEq)]
pub enum DataTool {
    FilterContains { column: usize, keyword: String },
    Sort { column: usize, ascending: bool },
    TopK { column: usize, k: usize },
    DropEmpty { column: usize },
    DedupeBy { column: usize },
}

impl DataTool {
    pub fn describe(&self) -> String {
        match self {
            Self::FilterContains { keyword, .. } => format!("filter: contains \"{keyword}\""),
            Self::Sort { ascending: true, .. } => "sort ascending".to_string(),
            Self::Sort { ascending: false, .. } => "sort descending".to_string(),
            Self::TopK { k, .. } => format!("top {k} rows"),
            Self::DropEmpty { .. } => "drop rows with empty cells".to_string(),
            Self::DedupeBy { .. } => "de-duplicate".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    EmptyTable,
    ColumnOutOfRange(usize),
    EmptyKeyword,
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTable => write!(f, "the table has no header row"),
            Self::ColumnOutOfRange(index) => write!(f, "column index {index} is out of range"),
            Self::EmptyKeyword => write!(f, "filter keyword is empty"),
        }
    }
}

fn cell<'a>(row: &'a [String], column: usize) -> &'a str {
    row.get(column).map(String::as_str).unwrap_or("")
}

/// A column is treated as numeric when more than 60% of its non-empty cells
/// parse as numbers, matching how mixed columns sort most usefully.
fn is_numeric_column(rows: &[Vec<String>], column: usize) -> bool {
    let mut numeric = 0usize;
    let mut total = 0usize;
    for row in rows {
        let value = cell(row, column);
        if !value.is_empty() {
            total += 1;
            if value.parse::<f64>().is_ok() {
                numeric += 1;
            }
        }
    }
    total > 0 && (numeric as f64) / (total as f64) > 0.6
}

fn compare_cells(a: &str, b: &str, numeric: bool) -> Ordering {
    if numeric {
        let left = a.parse::<f64>().unwrap_or(f64::NEG_INFINITY);
        let right = b.parse::<f64>().unwrap_or(f64::NEG_INFINITY);
        left.partial_cmp(&right).unwrap_or(Ordering::Equal)
    } else {
        a.cmp(b)
    }
}

/// Applies a tool to CSV text, returning the transformed text. The header row
/// always survives; only data rows are filtered, sorted, or trimmed.
pub fn apply(tool: &DataTool, csv_text: &str) -> Result<String, ToolError> {
    let mut rows = csv::parse(csv_text);
    if rows.is_empty() {
        return Err(ToolError::EmptyTable);
    }
    let header = rows.remove(0);
    let column = match tool {
        DataTool::FilterContains { column, .. }
        | DataTool::Sort { column, .. }
        | DataTool::TopK { column, .. }
        | DataTool::DropEmpty { column }
        | DataTool::DedupeBy { column } => *column,
    };
    if column >= header.len() {
        return Err(ToolError::ColumnOutOfRange(column));
    }

    let data = match tool {
        DataTool::FilterContains { keyword, .. } => {
            let keyword = keyword.trim();
            if keyword.is_empty() {
                return Err(ToolError::EmptyKeyword);
            }
            rows.into_iter()
                .filter(|row| cell(row, column).contains(keyword))
                .collect()
        }
        DataTool::Sort { ascending, .. } => {
            let numeric = is_numeric_column(&rows, column);
            let mut sorted = rows;
            sorted.sort_by(|a, b| {
                let ordering = compare_cells(cell(a, column), cell(b, column), numeric);
                if *ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
            sorted
        }
        DataTool::TopK { k, .. } => {
            let k = (*k).max(1);
            let numeric = is_numeric_column(&rows, column);
            let mut sorted = rows;
            sorted.sort_by(|a, b| compare_cells(cell(b, column), cell(a, column), numeric));
            sorted.truncate(k);
            sorted
        }
        DataTool::DropEmpty { .. } => rows
            .into_iter()
            .filter(|row| !cell(row, column).trim().is_empty())
            .collect(),
        DataTool::DedupeBy { .. } => {
            let mut seen = HashSet::new();
            rows.into_iter()
                .filter(|row| seen.insert(cell(row, column).to_string()))
                .collect::<Vec<_>>()
        }
    };

    let mut result = vec![header];
    result.extend(data);
    Ok(csv::serialize(&result))
}

#[cfg(test)]
mod tests {
    use super::{apply, DataTool, ToolError};

    const SALES: &str = "name,amount\nA,10\nB,20\nC,5\nD,20";

    #[test]
    fn filter_keeps_rows_containing_the_keyword() {
        let tool = DataTool::FilterContains {
            column: 0,
            keyword: "B".to_string(),
        };
        assert_eq!(apply(&tool, SALES).unwrap(), "name,amount\nB,20");
    }

    #[test]
    fn filter_rejects_blank_keyword() {
        let tool = DataTool::FilterContains {
            column: 0,
            keyword: "  ".to_string(),
        };
        assert_eq!(apply(&tool, SALES), Err(ToolError::EmptyKeyword));
    }

    #[test]
    fn numeric_columns_sort_numerically() {
        let tool = DataTool::Sort {
            column: 1,
            ascending: false,
        };
        assert_eq!(
            apply(&tool, SALES).unwrap(),
            "name,amount\nB,20\nD,20\nA,10\nC,5"
        );
    }

    #[test]
    fn text_columns_sort_lexically() {
        let csv = "city\nUtrecht\nAmsterdam\nDelft";
        let tool = DataTool::Sort {
            column: 0,
            ascending: true,
        };
        assert_eq!(apply(&tool, csv).unwrap(), "city\nAmsterdam\nDelft\nUtrecht");
    }

    #[test]
    fn top_k_keeps_the_largest_values() {
        let tool = DataTool::TopK { column: 1, k: 2 };
        assert_eq!(apply(&tool, SALES).unwrap(), "name,amount\nB,20\nD,20");
    }

    #[test]
    fn top_k_floor_is_one() {
        let tool = DataTool::TopK { column: 1, k: 0 };
        assert_eq!(apply(&tool, SALES).unwrap(), "name,amount\nB,20");
    }

    #[test]
    fn drop_empty_removes_blank_cells_only() {
        let csv = "name,amount\nA,10\nB,\nC, \nD,4";
        let tool = DataTool::DropEmpty { column: 1 };
        assert_eq!(apply(&tool, csv).unwrap(), "name,amount\nA,10\nD,4");
    }

    #[test]
    fn dedupe_keeps_the_first_occurrence() {
        let tool = DataTool::DedupeBy { column: 1 };
        assert_eq!(apply(&tool, SALES).unwrap(), "name,amount\nA,10\nB,20\nC,5");
    }

    #[test]
    fn out_of_range_column_is_an_error() {
        let tool = DataTool::DropEmpty { column: 9 };
        assert_eq!(apply(&tool, SALES), Err(ToolError::ColumnOutOfRange(9)));
        assert_eq!(
            apply(&DataTool::DropEmpty { column: 0 }, ""),
            Err(ToolError::EmptyTable)
        );
    }
}
