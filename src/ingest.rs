use crate::engine::csv;
use crate::engine::schema;
use crate::engine::table::{table_stats, Table, TableStats};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    Unreadable(String),
    NoUsableSheets,
    EmptyPaste,
    NoHeaderRow,
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable(detail) => write!(f, "could not read the file: {detail}"),
            Self::NoUsableSheets => write!(f, "no usable sheets found in the workbook"),
            Self::EmptyPaste => write!(f, "pasted data is empty"),
            Self::NoHeaderRow => {
                write!(f, "no header row detected; separate columns with commas or tabs")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSheet {
    pub table: Table,
    pub sheet_name: String,
    pub stats: TableStats,
}

/// Pick a workspace-unique table name for a sheet: the sheet name alone if
/// free, then qualified by the file stem, then numbered.
fn unique_table_name(file_stem: &str, sheet_name: &str, taken: &mut HashSet<String>) -> String {
    let cleaned_sheet = {
        let collapsed = sheet_name.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            "Sheet1".to_string()
        } else {
            collapsed
        }
    };
    if taken.insert(cleaned_sheet.clone()) {
        return cleaned_sheet;
    }

    let qualified = format!("{cleaned_sheet} · {file_stem}");
    if taken.insert(qualified.clone()) {
        return qualified;
    }

    let mut counter = 2;
    loop {
        let candidate = format!("{qualified} ({counter})");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

fn range_to_csv(range: &calamine::Range<Data>) -> String {
    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| cell.as_string().unwrap_or_else(|| cell.to_string()))
                .collect()
        })
        .collect();
    csv::serialize(&rows)
}

/// Open a workbook and turn every non-empty sheet with a detectable header
/// into its own table. `taken` holds the names already used by the workspace.
pub fn load_workbook(path: &Path, taken: &HashSet<String>) -> Result<Vec<ImportedSheet>, IngestError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| IngestError::Unreadable(err.to_string()))?;
    let file_stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("workbook")
        .to_string();

    let mut taken = taken.clone();
    let mut imported = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(_) => continue,
        };
        let csv_text = csv::canonicalize(&range_to_csv(&range));
        if csv_text.is_empty() {
            continue;
        }
        if schema::extract_headers(&csv_text).is_empty() {
            continue;
        }

        let table_name = unique_table_name(&file_stem, &sheet_name, &mut taken);
        let stats = table_stats(&csv_text);
        imported.push(ImportedSheet {
            table: Table::new(table_name, csv_text),
            sheet_name: sheet_name.clone(),
            stats,
        });
    }

    if imported.is_empty() {
        return Err(IngestError::NoUsableSheets);
    }
    Ok(imported)
}

/// Canonicalize pasted delimited text into a single table. A header row is
/// required; the generated name is unique within the workspace.
pub fn paste(raw: &str, taken: &HashSet<String>) -> Result<ImportedSheet, IngestError> {
    let csv_text = csv::canonicalize(raw);
    if csv_text.is_empty() {
        return Err(IngestError::EmptyPaste);
    }
    if schema::extract_headers(&csv_text).is_empty() {
        return Err(IngestError::NoHeaderRow);
    }

    let mut counter = 1;
    let name = loop {
        let candidate = format!("Pasted data {counter}");
        if !taken.contains(&candidate) {
            break candidate;
        }
        counter += 1;
    };

    let stats = table_stats(&csv_text);
    Ok(ImportedSheet {
        table: Table::new(name, csv_text),
        sheet_name: String::new(),
        stats,
    })
}

/// Summary line for the transcript after a workbook import, previewing up to
/// three sheets.
pub fn import_summary(file_name: &str, sheets: &[ImportedSheet]) -> String {
    let preview: Vec<String> = sheets
        .iter()
        .take(3)
        .map(|sheet| {
            format!(
                "{} ({} columns · {} rows)",
                sheet.table.name, sheet.stats.columns, sheet.stats.rows
            )
        })
        .collect();
    let mut summary = format!(
        "File {file_name} loaded with {} sheet{}: {}",
        sheets.len(),
        if sheets.len() == 1 { "" } else { "s" },
        preview.join(", ")
    );
    if sheets.len() > 3 {
        summary.push_str(&format!(" and {} more", sheets.len() - 3));
    }
    summary.push('.');
    summary
}

#[cfg(test)]
mod tests {
    use super::{import_summary, paste, unique_table_name, ImportedSheet, IngestError};
    use crate::engine::table::{table_stats, Table};
    use std::collections::HashSet;

    #[test]
    fn sheet_names_are_deduplicated_in_stages() {
        let mut taken: HashSet<String> = ["Sheet1".to_string()].into_iter().collect();
        assert_eq!(
            unique_table_name("report", "Sheet1", &mut taken),
            "Sheet1 · report"
        );
        assert_eq!(
            unique_table_name("report", "Sheet1", &mut taken),
            "Sheet1 · report (2)"
        );
        assert_eq!(unique_table_name("report", "  ", &mut taken), "Sheet1 · report (3)");
        assert_eq!(unique_table_name("report", "Totals", &mut taken), "Totals");
    }

    #[test]
    fn paste_canonicalizes_and_names_the_table() {
        let taken = HashSet::new();
        let imported = paste("\r\nname,amount\r\nA,10\r\n\r\n", &taken).expect("paste should work");
        assert_eq!(imported.table.name, "Pasted data 1");
        assert_eq!(imported.table.current_data, "name,amount\nA,10");
        assert_eq!(imported.stats.rows, 1);
    }

    #[test]
    fn paste_name_skips_taken_names() {
        let taken: HashSet<String> = ["Pasted data 1".to_string()].into_iter().collect();
        let imported = paste("a,b\n1,2", &taken).expect("paste should work");
        assert_eq!(imported.table.name, "Pasted data 2");
    }

    #[test]
    fn paste_rejects_empty_and_headerless_input() {
        let taken = HashSet::new();
        assert_eq!(paste("  \n ", &taken), Err(IngestError::EmptyPaste));
        assert_eq!(paste(" , ,\n1,2", &taken), Err(IngestError::NoHeaderRow));
    }

    #[test]
    fn summary_previews_at_most_three_sheets() {
        let sheets: Vec<ImportedSheet> = (1..=5)
            .map(|index| {
                let csv = "a,b\n1,2";
                ImportedSheet {
                    table: Table::new(format!("Sheet{index}"), csv),
                    sheet_name: format!("Sheet{index}"),
                    stats: table_stats(csv),
                }
            })
            .collect();
        let summary = import_summary("report.xlsx", &sheets);
        assert!(summary.contains("5 sheets"));
        assert!(summary.contains("Sheet3"));
        assert!(!summary.contains("Sheet4 ("));
        assert!(summary.contains("and 2 more"));
    }
}
