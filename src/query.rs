//! Structured queries over tabular documents.
//!
//! Questions about CSV data are classified into a small set of typed matchers
//! instead of being forwarded to the remote backend. Classification is
//! first-match-wins: identifier lookup, then numeric comparison, then
//! categorical filter, then a generic substring scan.

use regex::Regex;

use crate::models::{CellValue, Document, Row};

/// Identifier column aliases checked, in order, for an exact row match.
const ID_ALIASES: [&str; 5] = ["CustomerID", "Customer Id", "customerId", "ID", "Index"];

/// Categorical column aliases for gender/genre filters.
const CATEGORY_ALIASES: [&str; 3] = ["Genre", "Gender", "gender"];

/// Columns a numeric comparison can target. Each field knows the header
/// spellings it answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    Age,
    Income,
    Score,
}

impl NumericField {
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            NumericField::Age => &["Age", "age"],
            NumericField::Income => &["Annual_Income_(k$)", "Income", "income"],
            NumericField::Score => &["Spending_Score", "Score", "score"],
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            NumericField::Age => "age",
            NumericField::Income => "income",
            NumericField::Score => "score",
        }
    }

    fn lookup<'a>(&self, row: &'a Row) -> Option<&'a CellValue> {
        self.aliases().iter().find_map(|alias| row.get(*alias))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
}

impl CompareOp {
    fn parse(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(CompareOp::Gt),
            "<" => Some(CompareOp::Lt),
            ">=" | "=>" => Some(CompareOp::Ge),
            "<=" | "=<" => Some(CompareOp::Le),
            "=" | "==" => Some(CompareOp::Eq),
            _ => None,
        }
    }

    fn holds(&self, left: i64, right: i64) -> bool {
        match self {
            CompareOp::Gt => left > right,
            CompareOp::Lt => left < right,
            CompareOp::Ge => left >= right,
            CompareOp::Le => left <= right,
            CompareOp::Eq => left == right,
        }
    }
}

/// A classified data question.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredQuery {
    /// "customer id 25 details": exact match on an identifier column.
    IdentifierLookup { id: String },
    /// "age > 30": numeric comparison on a known field. An operator string
    /// that parsed to nothing matches no rows at all.
    NumericComparison {
        field: NumericField,
        op: Option<CompareOp>,
        value: i64,
    },
    /// "show female customers": equality on a category column.
    CategoricalFilter { category: String },
    /// Anything else: cleaned substring scan over every cell.
    GenericSubstring { needle: String },
}

/// Classify a free-text question into a typed matcher.
pub fn parse_query(question: &str) -> StructuredQuery {
    let lower = question.to_lowercase();

    if lower.contains("customer") && lower.contains("id") {
        if let Ok(re) = Regex::new(r"(?i)customer\s*id[:\s]*(\d+)") {
            if let Some(caps) = re.captures(question) {
                return StructuredQuery::IdentifierLookup {
                    id: caps[1].to_string(),
                };
            }
        }
    }

    for field in [NumericField::Age, NumericField::Income, NumericField::Score] {
        if lower.contains(field.keyword())
            && (lower.contains('>') || lower.contains('<') || lower.contains('='))
        {
            let pattern = format!(r"(?i){}\s*([><=]+)\s*(\d+)", field.keyword());
            if let Ok(re) = Regex::new(&pattern) {
                if let Some(caps) = re.captures(question) {
                    if let Ok(value) = caps[2].parse::<i64>() {
                        return StructuredQuery::NumericComparison {
                            field,
                            op: CompareOp::parse(&caps[1]),
                            value,
                        };
                    }
                }
            }
        }
    }

    if lower.contains("genre") || lower.contains("gender") {
        if let Ok(re) = Regex::new(r"(?i)\b(male|female)\b") {
            if let Some(caps) = re.captures(question) {
                return StructuredQuery::CategoricalFilter {
                    category: caps[1].to_lowercase(),
                };
            }
        }
    }

    let needle = lower
        .chars()
        .filter(|c| !matches!(c, '>' | '<' | '='))
        .collect::<String>()
        .trim()
        .to_string();
    StructuredQuery::GenericSubstring { needle }
}

fn row_matches(query: &StructuredQuery, row: &Row) -> bool {
    match query {
        StructuredQuery::IdentifierLookup { id } => ID_ALIASES
            .iter()
            .filter_map(|alias| row.get(*alias))
            .any(|cell| cell.to_string() == *id),
        StructuredQuery::NumericComparison { field, op, value } => match op {
            // An absent or unparseable field compares as 0.
            Some(op) => op.holds(
                field
                    .lookup(row)
                    .map(CellValue::as_i64_or_zero)
                    .unwrap_or(0),
                *value,
            ),
            // Fail closed: an operator we could not parse matches nothing.
            None => false,
        },
        StructuredQuery::CategoricalFilter { category } => CATEGORY_ALIASES
            .iter()
            .filter_map(|alias| row.get(*alias))
            .any(|cell| cell.to_string().to_lowercase().contains(category)),
        StructuredQuery::GenericSubstring { needle } => {
            !needle.is_empty()
                && row
                    .values()
                    .any(|cell| cell.to_string().to_lowercase().contains(needle))
        }
    }
}

/// Run a classified query against every tabular document and render a
/// plain-text report. Text-only documents are skipped.
pub fn run_query(documents: &[Document], question: &str) -> String {
    let query = parse_query(question);
    let mut out = String::new();
    let mut any_table = false;
    let mut any_match = false;

    for doc in documents {
        let Some(table) = doc.table.as_ref().filter(|t| !t.rows.is_empty()) else {
            continue;
        };
        any_table = true;

        let hits: Vec<&Row> = table
            .rows
            .iter()
            .filter(|row| row_matches(&query, row))
            .collect();
        if hits.is_empty() {
            continue;
        }
        any_match = true;

        out.push_str(&format!(
            "From {} ({} matching record{}):\n",
            doc.name,
            hits.len(),
            if hits.len() == 1 { "" } else { "s" }
        ));
        match &query {
            StructuredQuery::IdentifierLookup { .. } => {
                // Identifier lookups are near-unique; show the full rows.
                for row in hits.iter().take(3) {
                    out.push_str("  ");
                    out.push_str(&render_full_row(&table.headers, row));
                    out.push('\n');
                }
            }
            _ => {
                let shown_headers: Vec<&String> = table.headers.iter().take(6).collect();
                for row in hits.iter().take(10) {
                    let cells: Vec<String> = shown_headers
                        .iter()
                        .map(|h| {
                            format!(
                                "{}={}",
                                h,
                                row.get(*h).map(|c| c.to_string()).unwrap_or_default()
                            )
                        })
                        .collect();
                    out.push_str("  ");
                    out.push_str(&cells.join(", "));
                    out.push('\n');
                }
                if hits.len() > 10 {
                    out.push_str(&format!("  ...and {} more records\n", hits.len() - 10));
                }
            }
        }
        out.push('\n');
    }

    if !any_table {
        return "No tabular data is loaded. Upload a CSV file to run data queries.".to_string();
    }
    if !any_match {
        return no_match_report(documents, question);
    }
    out.trim_end().to_string()
}

/// Zero-match guidance: restate the query, list what is actually queryable,
/// and show example shapes that would work.
fn no_match_report(documents: &[Document], question: &str) -> String {
    let mut out = format!("No records matched \"{}\".\n\nAvailable data:\n", question.trim());
    for doc in documents {
        let Some(table) = doc.table.as_ref().filter(|t| !t.rows.is_empty()) else {
            continue;
        };
        out.push_str(&format!(
            "  {} ({} records) columns: {}\n",
            doc.name,
            table.rows.len(),
            table.headers.join(", ")
        ));
        let samples: Vec<String> = table
            .rows
            .iter()
            .filter_map(|row| row.get(&table.id_column))
            .take(5)
            .map(|cell| cell.to_string())
            .collect();
        if !samples.is_empty() {
            out.push_str(&format!(
                "    sample {} values: {}\n",
                table.id_column,
                samples.join(", ")
            ));
        }
    }
    out.push_str(
        "\nTry queries like: \"Customer Id 1 Details\", \"age > 25\", or \"income < 50\".",
    );
    out
}

fn render_full_row(headers: &[String], row: &Row) -> String {
    headers
        .iter()
        .map(|h| {
            format!(
                "{}: {}",
                h,
                row.get(h).map(|c| c.to_string()).unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Table;
    use chrono::Utc;
    use std::collections::HashMap;

    fn table_doc(name: &str, headers: &[&str], rows: Vec<Vec<CellValue>>) -> Document {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|cells| {
                headers
                    .iter()
                    .cloned()
                    .zip(cells)
                    .collect::<HashMap<_, _>>()
            })
            .collect();
        Document {
            id: format!("id-{}", name),
            name: name.to_string(),
            mime_hint: "text/csv".into(),
            size_bytes: 100,
            text: "csv content".into(),
            table: Some(Table {
                id_column: headers[0].clone(),
                headers,
                rows,
                parse_errors: Vec::new(),
            }),
            uploaded_at: Utc::now(),
            from_session: false,
            had_full_content: false,
        }
    }

    fn customers() -> Document {
        table_doc(
            "customers.csv",
            &["CustomerID", "Genre", "Age", "Income"],
            vec![
                vec![
                    CellValue::Int(1),
                    CellValue::Str("Male".into()),
                    CellValue::Int(19),
                    CellValue::Int(15),
                ],
                vec![
                    CellValue::Int(2),
                    CellValue::Str("Female".into()),
                    CellValue::Int(35),
                    CellValue::Int(81),
                ],
                vec![
                    CellValue::Int(3),
                    CellValue::Str("Female".into()),
                    CellValue::Int(47),
                    CellValue::Int(54),
                ],
            ],
        )
    }

    #[test]
    fn classifies_identifier_lookup() {
        assert_eq!(
            parse_query("Customer Id 25 Details"),
            StructuredQuery::IdentifierLookup { id: "25".into() }
        );
    }

    #[test]
    fn classifies_numeric_comparison() {
        assert_eq!(
            parse_query("show customers with age > 30"),
            StructuredQuery::NumericComparison {
                field: NumericField::Age,
                op: Some(CompareOp::Gt),
                value: 30,
            }
        );
    }

    #[test]
    fn unknown_operator_fails_closed() {
        let query = StructuredQuery::NumericComparison {
            field: NumericField::Age,
            op: None,
            value: 30,
        };
        let doc = customers();
        let table = doc.table.as_ref().unwrap();
        assert!(table.rows.iter().all(|row| !row_matches(&query, row)));
    }

    #[test]
    fn absent_numeric_field_compares_as_zero() {
        let doc = table_doc(
            "ages.csv",
            &["id", "Age"],
            vec![
                vec![CellValue::Int(1), CellValue::Int(19)],
                vec![CellValue::Int(2), CellValue::Int(35)],
            ],
        );
        // No income column: every row's income reads as 0.
        let report = run_query(&[doc.clone()], "income < 50");
        assert!(report.contains("2 matching records"));
        let report = run_query(&[doc], "income > 50");
        assert!(report.contains("No records matched"));
    }

    #[test]
    fn numeric_comparison_selects_matching_rows() {
        let report = run_query(&[customers()], "age > 30");
        assert!(report.contains("2 matching records"));
        assert!(report.contains("Age=35"));
        assert!(report.contains("Age=47"));
        assert!(!report.contains("Age=19"));
    }

    #[test]
    fn identifier_lookup_shows_full_row() {
        let report = run_query(&[customers()], "customer id 2 details");
        assert!(report.contains("1 matching record"));
        assert!(report.contains("CustomerID: 2"));
        assert!(report.contains("Income: 81"));
        assert!(!report.contains("CustomerID: 3"));
    }

    #[test]
    fn categorical_filter_matches_case_insensitively() {
        let report = run_query(&[customers()], "show gender female");
        assert!(report.contains("2 matching records"));
    }

    #[test]
    fn zero_matches_lists_columns_and_samples() {
        let report = run_query(&[customers()], "age > 200");
        assert!(report.contains("No records matched"));
        assert!(report.contains("CustomerID, Genre, Age, Income"));
        assert!(report.contains("sample CustomerID values"));
        assert!(report.contains("Customer Id 1 Details"));
    }

    #[test]
    fn no_tables_loaded_is_reported() {
        let report = run_query(&[], "age > 30");
        assert!(report.contains("No tabular data"));
    }
}
