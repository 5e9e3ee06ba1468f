//! End-to-end behavior of the local pipeline: extraction, indexing,
//! keyword search, structured queries, and the chat fallback search.

use chrono::Utc;

use docdesk::config::SearchConfig;
use docdesk::extract;
use docdesk::index::{AddOutcome, DocumentIndex};
use docdesk::models::Document;
use docdesk::query;
use docdesk::search;
use docdesk::tabular;

fn doc_from_bytes(bytes: &[u8], name: &str) -> Document {
    let mime = extract::mime_hint_for(name);
    let extracted = extract::extract(bytes, name, mime).unwrap();
    Document {
        id: format!("id-{}", name),
        name: name.to_string(),
        mime_hint: mime.to_string(),
        size_bytes: bytes.len() as u64,
        text: extracted.text,
        table: extracted.table,
        uploaded_at: Utc::now(),
        from_session: false,
        had_full_content: false,
    }
}

#[test]
fn same_filename_is_one_logical_document() {
    let mut index = DocumentIndex::new();
    let first = doc_from_bytes(b"first upload with some content", "report.txt");
    let second = doc_from_bytes(b"different content, same name", "report.txt");
    assert_eq!(index.add(first), AddOutcome::Added);
    assert_eq!(index.add(second), AddOutcome::Duplicate);
    assert_eq!(index.len(), 1);
    assert!(index
        .get("report.txt")
        .unwrap()
        .text
        .contains("first upload"));
}

#[test]
fn search_counts_word_boundary_occurrences_per_document() {
    let docs = vec![
        doc_from_bytes(
            b"The annual budget was approved today. Next year the budget doubles in size.",
            "a.txt",
        ),
        doc_from_bytes(
            b"A budgetary note that never uses the bare word anywhere in its text.",
            "b.txt",
        ),
    ];
    let results = search::search(&docs, "budget");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document_name, "a.txt");
    assert_eq!(results[0].total_occurrences, 2);
    assert_eq!(results[0].total_matches, 2);
    assert_eq!(results[0].matches[0].sequence_number, 1);
}

#[test]
fn csv_search_matches_whole_rows() {
    let doc = doc_from_bytes(b"id,name,city\n1,Ada,London\n2,Grace,Boston\n", "people.csv");
    let results = search::search(&[doc], "Boston");
    assert_eq!(results.len(), 1);
    let m = &results[0].matches[0];
    assert!(m.is_table_row);
    assert!(m.text.contains("Grace"));
    assert_eq!(m.source_index, 1);
}

#[test]
fn numeric_comparison_selects_exactly_the_matching_rows() {
    let doc = doc_from_bytes(b"id,age\n1,30\n2,40\n", "ages.csv");
    let report = query::run_query(&[doc], "age > 35");
    assert!(report.contains("1 matching record"));
    assert!(report.contains("age=40"));
    assert!(!report.contains("age=30"));
}

#[test]
fn identifier_lookup_returns_exactly_one_record() {
    let mut csv = String::from("CustomerID,Age\n");
    for i in 1..=50 {
        csv.push_str(&format!("{},{}\n", i, 20 + i % 30));
    }
    let doc = doc_from_bytes(csv.as_bytes(), "customers.csv");
    let report = query::run_query(&[doc], "Customer Id 25 details");
    assert!(report.contains("1 matching record"));
    assert!(report.contains("CustomerID: 25"));
    assert!(!report.contains("CustomerID: 24"));
    assert!(!report.contains("CustomerID: 26"));
}

#[test]
fn csv_encoding_carries_lookup_and_searchable_views() {
    let parsed = tabular::parse_csv("CustomerID,Genre,Age\n1,Male,19\n2,Female,35\n", "mall.csv");
    assert!(parsed.is_table);
    assert_eq!(parsed.metadata.id_column, "CustomerID");
    assert!(parsed.content.contains("TOTAL RECORDS: 2"));
    assert!(parsed.content.contains("RECORD LOOKUP"));
    assert!(parsed.content.contains("SEARCHABLE TEXT:"));
}

#[test]
fn malformed_csv_lines_are_skipped_not_fatal() {
    let parsed = tabular::parse_csv("id,age\n1,30\nonly-one-field\n2,40\n", "x.csv");
    assert!(parsed.is_table);
    assert_eq!(parsed.rows.len(), 2);
    assert!(!parsed.metadata.parse_errors.is_empty());
}

#[test]
fn fallback_search_skips_fragments_but_finds_substantive_sentences() {
    let doc = doc_from_bytes(
        b"Short. This is a much longer sentence about topics.",
        "notes.txt",
    );
    let config = SearchConfig {
        min_content_chars: 40,
        ..Default::default()
    };
    let report = search::chat_fallback_search(&[doc], "topic", &config);
    assert!(report.contains("This is a much longer sentence about topics"));
    assert!(!report.contains(". Short"));
    assert!(report.starts_with("Found 1 matches"));
}

#[test]
fn docx_round_trips_through_extraction() {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(
            b"<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>board meeting minutes for the merger</w:t></w:r></w:p></w:body></w:document>",
        )
        .unwrap();
        zip.finish().unwrap();
    }
    let doc = doc_from_bytes(&buf, "minutes.docx");
    let results = search::search(&[doc], "merger");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].total_occurrences, 1);
}
