//! Core data models for the document workspace.
//!
//! These types represent the documents, tables, and search results that flow
//! through ingestion, local search, and the ask orchestrator.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

/// A single typed cell in a tabular document. Types are inferred per cell
/// during CSV parsing; inference is best-effort, not schema-validated.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl CellValue {
    /// Numeric view used by comparison queries. Strings parse leading digits;
    /// anything unparseable is 0.
    pub fn as_i64_or_zero(&self) -> i64 {
        match self {
            CellValue::Int(v) => *v,
            CellValue::Float(v) => *v as i64,
            CellValue::Str(s) => {
                let digits: String = s
                    .trim()
                    .chars()
                    .take_while(|c| c.is_ascii_digit() || *c == '-')
                    .collect();
                digits.parse().unwrap_or(0)
            }
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Str(s) => write!(f, "{}", s),
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// One data row: column name to typed value.
pub type Row = HashMap<String, CellValue>;

/// Parsed tabular data carried alongside a document's text view.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Column names in source order.
    pub headers: Vec<String>,
    /// Rows in source order; malformed source lines are absent.
    pub rows: Vec<Row>,
    /// Primary identifier column (detected, or first column).
    pub id_column: String,
    /// Human-readable descriptions of skipped lines.
    pub parse_errors: Vec<String>,
}

/// One ingested, extracted file tracked in the active session's index.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    /// Original filename; the dedup key within a session.
    pub name: String,
    /// Declared content type, or inferred from the extension.
    pub mime_hint: String,
    pub size_bytes: u64,
    /// Normalized plain-text extraction. Never empty: extraction failures
    /// leave a descriptive placeholder so search never sees missing text.
    pub text: String,
    /// Structured data, present only for recognized tabular formats.
    pub table: Option<Table>,
    pub uploaded_at: DateTime<Utc>,
    /// True when the document came back from a restored session rather than
    /// a fresh upload; such documents may carry truncated text.
    pub from_session: bool,
    /// True when a prior full extraction existed for this document, even if
    /// the restored copy only kept a preview.
    pub had_full_content: bool,
}

impl Document {
    pub fn is_table(&self) -> bool {
        self.table.as_ref().is_some_and(|t| !t.rows.is_empty())
    }
}

/// Output of content extraction, before a [`Document`] is assembled.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub text: String,
    pub table: Option<Table>,
}

impl ExtractionResult {
    pub fn text_only(text: String) -> Self {
        Self { text, table: None }
    }

    pub fn is_table(&self) -> bool {
        self.table.as_ref().is_some_and(|t| !t.rows.is_empty())
    }
}

/// One matched unit within a document: a sentence for text documents, a row
/// for tabular ones.
#[derive(Debug, Clone)]
pub struct SentenceMatch {
    /// 1-based position within this document's match list.
    pub sequence_number: usize,
    pub text: String,
    /// Index of the sentence/row in the original document.
    pub source_index: usize,
    pub is_table_row: bool,
    pub row_data: Option<Row>,
}

/// Per-document search outcome. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document_id: String,
    pub document_name: String,
    pub size_bytes: u64,
    /// Matches in original-position order, possibly display-capped.
    pub matches: Vec<SentenceMatch>,
    pub total_matches: usize,
    /// True word-boundary hit count over the whole text; may exceed
    /// `total_matches` since one sentence can hold several occurrences.
    pub total_occurrences: usize,
}

/// Who produced a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
    System,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "USER",
            Speaker::Assistant => "AI",
            Speaker::System => "SYSTEM",
        }
    }
}

/// One entry in the visible conversation.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Set when the message was rebuilt from a restored session.
    pub restored: bool,
}

impl ChatMessage {
    pub fn new(speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            speaker,
            content: content.into(),
            timestamp: Utc::now(),
            restored: false,
        }
    }
}
