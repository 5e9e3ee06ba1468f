//! CSV parsing with typed rows and an AI-ingestible text encoding.
//!
//! The parser never fails outright: malformed lines are recorded and skipped,
//! and a file that cannot be parsed at all falls back to a header-only
//! description with `is_table = false`. The produced `content` encodes the
//! same table several ways (column analysis, an identifier lookup index, a
//! full structured dump, and a flat searchable blob) so the keyword search
//! engine and a remote model can both consume it without re-parsing.

use std::collections::HashMap;

use crate::models::{CellValue, Row};

/// Maximum sample values listed per column in the analysis view.
const COLUMN_SAMPLE_VALUES: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct CsvMetadata {
    pub total_lines: usize,
    pub parsed_rows: usize,
    pub skipped_rows: usize,
    pub parse_errors: Vec<String>,
    pub id_column: String,
}

/// Parse result. `content` is always populated, even on failure.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub content: String,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub is_table: bool,
    pub metadata: CsvMetadata,
}

/// Parse CSV text into typed rows plus the multi-view text encoding.
pub fn parse_csv(csv_text: &str, filename: &str) -> ParsedCsv {
    let lines: Vec<&str> = csv_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.is_empty() {
        return empty_result(filename, "file contains no data");
    }

    let headers = tokenize_line(lines[0]);
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return empty_result(filename, "header row could not be parsed");
    }

    let mut rows: Vec<Row> = Vec::new();
    let mut parse_errors: Vec<String> = Vec::new();

    for (line_no, line) in lines.iter().enumerate().skip(1) {
        let fields = tokenize_line(line);
        if fields.len() != headers.len() {
            // One bad line never aborts the file.
            parse_errors.push(format!(
                "line {}: expected {} fields, found {}",
                line_no + 1,
                headers.len(),
                fields.len()
            ));
            continue;
        }
        let row: Row = headers
            .iter()
            .cloned()
            .zip(fields.into_iter().map(coerce_cell))
            .collect();
        rows.push(row);
    }

    let id_column = detect_id_column(&headers);
    let metadata = CsvMetadata {
        total_lines: lines.len(),
        parsed_rows: rows.len(),
        skipped_rows: parse_errors.len(),
        parse_errors,
        id_column: id_column.clone(),
    };

    if rows.is_empty() {
        let mut content = format!(
            "CSV FILE: {}\nNo valid data rows were found.\nCOLUMNS: {}\n",
            filename,
            headers.join(", ")
        );
        for err in &metadata.parse_errors {
            content.push_str(&format!("PARSE ERROR: {}\n", err));
        }
        return ParsedCsv {
            content,
            headers,
            rows,
            is_table: false,
            metadata,
        };
    }

    let content = encode_content(filename, &headers, &rows, &id_column, &metadata);
    ParsedCsv {
        content,
        headers,
        rows,
        is_table: true,
        metadata,
    }
}

fn empty_result(filename: &str, reason: &str) -> ParsedCsv {
    ParsedCsv {
        content: format!("CSV FILE: {}\nCould not parse: {}.\n", filename, reason),
        headers: Vec::new(),
        rows: Vec::new(),
        is_table: false,
        metadata: CsvMetadata::default(),
    }
}

/// Split one line on commas, honoring double-quoted fields (a quoted field
/// may contain literal commas). Quotes are stripped from the extracted value.
fn tokenize_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Best-effort per-cell typing: all-digits is an integer, digits.digits is a
/// float, everything else stays a string.
fn coerce_cell(token: String) -> CellValue {
    let t = token.as_str();
    if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(v) = t.parse::<i64>() {
            return CellValue::Int(v);
        }
    }
    if let Some((whole, frac)) = t.split_once('.') {
        if !whole.is_empty()
            && !frac.is_empty()
            && whole.bytes().all(|b| b.is_ascii_digit())
            && frac.bytes().all(|b| b.is_ascii_digit())
        {
            if let Ok(v) = t.parse::<f64>() {
                return CellValue::Float(v);
            }
        }
    }
    CellValue::Str(token)
}

/// Find the primary identifier column: a header that normalizes (lowercase,
/// whitespace stripped) to a known identifier name, else the first column.
fn detect_id_column(headers: &[String]) -> String {
    const ID_NAMES: [&str; 4] = ["id", "customerid", "index", "primarykey"];
    headers
        .iter()
        .find(|h| {
            let normalized: String = h
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '_')
                .collect::<String>()
                .to_lowercase();
            ID_NAMES.contains(&normalized.as_str())
        })
        .cloned()
        .unwrap_or_else(|| headers[0].clone())
}

fn encode_content(
    filename: &str,
    headers: &[String],
    rows: &[Row],
    id_column: &str,
    metadata: &CsvMetadata,
) -> String {
    let mut out = String::new();

    out.push_str(&format!("CSV DATA FILE: {}\n", filename));
    out.push_str(&format!("TOTAL RECORDS: {}\n", rows.len()));
    out.push_str(&format!("COLUMNS: {}\n", headers.join(", ")));
    if metadata.skipped_rows > 0 {
        out.push_str(&format!(
            "SKIPPED MALFORMED LINES: {}\n",
            metadata.skipped_rows
        ));
    }
    out.push('\n');

    out.push_str("COLUMN ANALYSIS:\n");
    for header in headers {
        out.push_str(&analyze_column(header, rows));
    }
    out.push('\n');

    // Lookup view keyed by the identifier column, for point queries.
    out.push_str(&format!("RECORD LOOKUP (by {}):\n", id_column));
    for row in rows {
        let key = row
            .get(id_column)
            .map(|v| v.to_string())
            .unwrap_or_default();
        let summary: Vec<String> = headers
            .iter()
            .filter(|h| h.as_str() != id_column)
            .filter_map(|h| row.get(h).map(|v| format!("{}={}", h, v)))
            .collect();
        out.push_str(&format!("{} {}: {}\n", id_column, key, summary.join(", ")));
    }
    out.push('\n');

    out.push_str("COMPLETE RECORDS:\n");
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = headers
            .iter()
            .filter_map(|h| {
                row.get(h)
                    .map(|v| format!("{}=\"{}\"", h.replace(' ', "_"), v))
            })
            .collect();
        out.push_str(&format!("Record {}: {}\n", i + 1, cells.join(" ")));
    }
    out.push('\n');

    // Flat view: every cell value space-joined, one row per line, so plain
    // substring search hits table contents.
    out.push_str("SEARCHABLE TEXT:\n");
    for row in rows {
        let flat: Vec<String> = headers
            .iter()
            .filter_map(|h| row.get(h).map(|v| v.to_string()))
            .collect();
        out.push_str(&flat.join(" "));
        out.push('\n');
    }

    out
}

fn analyze_column(header: &str, rows: &[Row]) -> String {
    let mut distinct: HashMap<String, ()> = HashMap::new();
    let mut samples: Vec<String> = Vec::new();
    let mut ints = 0usize;
    let mut floats = 0usize;
    let mut total = 0usize;

    for row in rows {
        if let Some(value) = row.get(header) {
            total += 1;
            match value {
                CellValue::Int(_) => ints += 1,
                CellValue::Float(_) => floats += 1,
                CellValue::Str(_) => {}
            }
            let rendered = value.to_string();
            if !distinct.contains_key(&rendered) && samples.len() < COLUMN_SAMPLE_VALUES {
                samples.push(rendered.clone());
            }
            distinct.insert(rendered, ());
        }
    }

    let kind = if total > 0 && ints == total {
        "integer"
    } else if total > 0 && ints + floats == total {
        "numeric"
    } else {
        "text"
    };

    format!(
        "- {}: {} type, {} distinct values, samples: {}\n",
        header,
        kind,
        distinct.len(),
        samples.join(", ")
    )
}

/// Flat searchable rendering of a single row, used by the keyword engine to
/// surface table rows as match units.
pub fn flatten_row(headers: &[String], row: &Row) -> String {
    headers
        .iter()
        .filter_map(|h| row.get(h).map(|v| v.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}
