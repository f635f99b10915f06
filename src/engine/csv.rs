use csv::{ReaderBuilder, Terminator, WriterBuilder};

/// Parses delimited text into rows of fields. Tolerates ragged rows, quoted
/// fields with embedded delimiters, and mixed line endings. Empty input is an
/// empty table, not an error.
pub fn parse(text: &str) -> Vec<Vec<String>> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
            Err(_) => continue,
        }
    }
    rows
}

/// Serializes rows back to CSV text with `\n` terminators and no trailing
/// newline, quoting only where required, so `parse(serialize(rows)) == rows`.
pub fn serialize(rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in rows {
        if writer.write_record(row).is_err() {
            continue;
        }
    }

    let bytes = match writer.into_inner() {
        Ok(bytes) => bytes,
        Err(_) => return String::new(),
    };
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    while text.ends_with('\n') {
        text.pop();
    }
    text
}

/// Normalizes line endings and strips blank edge lines without touching
/// quoting or embedded tabs.
pub fn sanitize(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();
    let start = lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map(|idx| idx + 1)
        .unwrap_or(start);
    lines[start..end].join("\n")
}

/// Parse and re-serialize, producing a canonical form for storage.
pub fn canonicalize(raw: &str) -> String {
    serialize(&parse(&sanitize(raw)))
}

#[cfg(test)]
mod tests {
    use super::{canonicalize, parse, sanitize, serialize};

    fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn rectangular_matrix_round_trips() {
        let matrix = rows(&[&["name", "amount"], &["A", "10"], &["B", "20"]]);
        assert_eq!(parse(&serialize(&matrix)), matrix);
    }

    #[test]
    fn quoted_fields_round_trip() {
        let matrix = rows(&[
            &["city", "note"],
            &["Utrecht", "rainy, mild"],
            &["Delft", "said \"hello\""],
        ]);
        let text = serialize(&matrix);
        assert!(text.contains("\"rainy, mild\""));
        assert_eq!(parse(&text), matrix);
    }

    #[test]
    fn ragged_rows_survive() {
        let matrix = rows(&[&["a", "b", "c"], &["1", "2"], &["3", "4", "5", "6"]]);
        assert_eq!(parse(&serialize(&matrix)), matrix);
    }

    #[test]
    fn empty_input_parses_to_empty() {
        assert!(parse("").is_empty());
        assert!(parse("   \n  ").is_empty());
        assert_eq!(serialize(&[]), "");
    }

    #[test]
    fn mixed_line_endings_parse() {
        let parsed = parse("a,b\r\n1,2\n3,4");
        assert_eq!(parsed, rows(&[&["a", "b"], &["1", "2"], &["3", "4"]]));
    }

    #[test]
    fn sanitize_trims_blank_edges_and_normalizes_newlines() {
        assert_eq!(sanitize("\n\r\na,b\r\n1,2\n\n"), "a,b\n1,2");
        assert_eq!(sanitize("  \n  "), "");
    }

    #[test]
    fn canonicalize_produces_stable_text() {
        let canonical = canonicalize("a,b\r\n1,2\r\n");
        assert_eq!(canonical, "a,b\n1,2");
        assert_eq!(canonicalize(&canonical), canonical);
    }
}
