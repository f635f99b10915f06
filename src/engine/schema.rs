use crate::engine::csv;
use std::collections::HashSet;

/// Column names from the header row: trimmed, empty entries dropped, order
/// preserved.
pub fn extract_headers(csv_text: &str) -> Vec<String> {
    let rows = csv::parse(csv_text);
    let Some(header_row) = rows.first() else {
        return Vec::new();
    };
    header_row
        .iter()
        .map(|field| field.trim().to_string())
        .filter(|field| !field.is_empty())
        .collect()
}

/// An explicitly declared schema wins over re-deriving from the data, which
/// matters when a column is entirely blank and invisible to text extraction.
pub fn normalize_schema(explicit: Option<&[String]>, csv_text: &str) -> Vec<String> {
    if let Some(declared) = explicit {
        let cleaned: Vec<String> = declared
            .iter()
            .map(|field| field.trim().to_string())
            .filter(|field| !field.is_empty())
            .collect();
        if !cleaned.is_empty() {
            return cleaned;
        }
    }
    extract_headers(csv_text)
}

/// Baseline columns absent from the candidate, in baseline order.
pub fn missing_columns(baseline: &[String], candidate: &[String]) -> Vec<String> {
    if baseline.is_empty() {
        return Vec::new();
    }
    let candidate_set: HashSet<&str> = candidate.iter().map(String::as_str).collect();
    baseline
        .iter()
        .filter(|column| !candidate_set.contains(column.as_str()))
        .cloned()
        .collect()
}

/// Outcome of comparing a candidate schema against the destination baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Accept,
    /// The candidate drops columns the destination already had; the existing
    /// data must be kept and the user told which columns went missing.
    Reject { missing: Vec<String> },
}

/// The AI may add columns or start a new table from scratch, but must not
/// silently drop columns from a table it updates in place. An empty baseline
/// (brand-new destination) always accepts.
pub fn reconcile(baseline: &[String], candidate: &[String]) -> Reconciliation {
    let missing = missing_columns(baseline, candidate);
    if !missing.is_empty() && !baseline.is_empty() {
        Reconciliation::Reject { missing }
    } else {
        Reconciliation::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_headers, missing_columns, normalize_schema, reconcile, Reconciliation};

    fn schema(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|column| column.to_string()).collect()
    }

    #[test]
    fn extract_headers_trims_and_drops_empty_fields() {
        assert_eq!(
            extract_headers(" name , amount ,,\nA,10"),
            schema(&["name", "amount"])
        );
        assert!(extract_headers("").is_empty());
    }

    #[test]
    fn extract_headers_reads_only_the_first_row() {
        assert_eq!(extract_headers("a,b\nc,d,e"), schema(&["a", "b"]));
    }

    #[test]
    fn normalize_prefers_non_empty_explicit_schema() {
        let declared = schema(&[" region ", "", "total"]);
        assert_eq!(
            normalize_schema(Some(&declared), "x,y\n1,2"),
            schema(&["region", "total"])
        );
    }

    #[test]
    fn normalize_falls_back_to_derivation() {
        assert_eq!(normalize_schema(None, "x,y\n1,2"), schema(&["x", "y"]));
        let blank = schema(&["", "  "]);
        assert_eq!(normalize_schema(Some(&blank), "x,y\n1,2"), schema(&["x", "y"]));
    }

    #[test]
    fn rejects_when_baseline_columns_go_missing() {
        let outcome = reconcile(&schema(&["a", "b", "c"]), &schema(&["a", "c"]));
        assert_eq!(
            outcome,
            Reconciliation::Reject {
                missing: schema(&["b"])
            }
        );
    }

    #[test]
    fn accepts_a_superset_of_the_baseline() {
        let outcome = reconcile(&schema(&["a", "b"]), &schema(&["a", "b", "d"]));
        assert_eq!(outcome, Reconciliation::Accept);
    }

    #[test]
    fn empty_baseline_always_accepts() {
        assert_eq!(reconcile(&[], &schema(&["anything"])), Reconciliation::Accept);
    }

    #[test]
    fn missing_columns_preserve_baseline_order() {
        let missing = missing_columns(&schema(&["c", "a", "b"]), &schema(&["a"]));
        assert_eq!(missing, schema(&["c", "b"]));
    }
}
