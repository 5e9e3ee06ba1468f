//! Sentence-level keyword search over the document index.
//!
//! Two entry points with deliberately different recall:
//!
//! - [`search`] backs the dashboard keyword box: strict case-insensitive
//!   substring containment, every match returned.
//! - [`chat_fallback_search`] backs the chat path when the remote AI service
//!   cannot answer: looser word-level matching with two fixed synonym
//!   expansions, capped matches, and a formatted text report.
//!
//! Both count `total_occurrences` with a word-boundary regex over the whole
//! text, which is the authoritative figure shown to the user and can exceed
//! the sentence-match count.

use regex::Regex;

use crate::config::SearchConfig;
use crate::models::{Document, SearchResult, SentenceMatch};
use crate::tabular;

/// Preview length for fallback-search snippets.
const SNIPPET_CHARS: usize = 300;

/// Sentences at or under this length are stray fragments, never matched.
const MIN_SENTENCE_CHARS: usize = 20;

/// Split text into trimmed, non-empty sentences with their original index.
/// Runs of `.`, `!`, `?` terminate a sentence.
pub fn split_sentences(text: &str) -> Vec<(usize, String)> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .enumerate()
        .collect()
}

fn occurrence_count(text: &str, query: &str) -> usize {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(query.trim()));
    match Regex::new(&pattern) {
        Ok(re) => re.find_iter(text).count(),
        Err(_) => 0,
    }
}

/// Dashboard keyword search: deterministic, synchronous, strict substring
/// matching. Documents appear in index order; matches in original position
/// order. A document contributes only when `total_occurrences > 0`.
pub fn search(documents: &[Document], query: &str) -> Vec<SearchResult> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();

    documents
        .iter()
        .filter_map(|doc| {
            let matches = if doc.is_table() {
                table_row_matches(doc, &needle)
            } else {
                sentence_matches(doc, &needle)
            };
            let total_occurrences = occurrence_count(&doc.text, query);
            if total_occurrences == 0 {
                return None;
            }
            Some(SearchResult {
                document_id: doc.id.clone(),
                document_name: doc.name.clone(),
                size_bytes: doc.size_bytes,
                total_matches: matches.len(),
                matches,
                total_occurrences,
            })
        })
        .collect()
}

fn sentence_matches(doc: &Document, needle: &str) -> Vec<SentenceMatch> {
    split_sentences(&doc.text)
        .into_iter()
        .filter(|(_, sentence)| sentence.len() > MIN_SENTENCE_CHARS)
        .filter(|(_, sentence)| sentence.to_lowercase().contains(needle))
        .enumerate()
        .map(|(seq, (source_index, text))| SentenceMatch {
            sequence_number: seq + 1,
            text,
            source_index,
            is_table_row: false,
            row_data: None,
        })
        .collect()
}

/// Tabular documents are searched row-wise: the match unit is the flattened
/// row text, and the matched row travels with the result.
fn table_row_matches(doc: &Document, needle: &str) -> Vec<SentenceMatch> {
    let Some(table) = doc.table.as_ref() else {
        return Vec::new();
    };
    table
        .rows
        .iter()
        .enumerate()
        .filter_map(|(row_index, row)| {
            let flat = tabular::flatten_row(&table.headers, row);
            if flat.to_lowercase().contains(needle) {
                Some((row_index, flat, row.clone()))
            } else {
                None
            }
        })
        .enumerate()
        .map(|(seq, (row_index, flat, row))| SentenceMatch {
            sequence_number: seq + 1,
            text: flat,
            source_index: row_index,
            is_table_row: true,
            row_data: Some(row),
        })
        .collect()
}

/// Strip decoration the chat input tends to carry, keeping word characters,
/// whitespace, and the comparison operators data queries rely on.
pub fn clean_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| {
            c.is_alphanumeric()
                || c.is_whitespace()
                || matches!(c, '-' | '.' | ',' | '?' | '!' | '>' | '<' | '=' | '(' | ')')
        })
        .collect::<String>()
        .trim()
        .to_lowercase()
}

fn sentence_matches_fallback(sentence_lower: &str, clean: &str, words: &[&str]) -> bool {
    if sentence_lower.contains(clean) {
        return true;
    }
    if words.iter().any(|w| sentence_lower.contains(w)) {
        return true;
    }
    // Two fixed expansions for the chat path only; not a general synonym
    // system.
    if clean.contains("topic")
        && ["topic", "subject", "main", "key"]
            .iter()
            .any(|w| sentence_lower.contains(w))
    {
        return true;
    }
    if clean.contains("conclusion")
        && ["conclusion", "result", "finding", "summary"]
            .iter()
            .any(|w| sentence_lower.contains(w))
    {
        return true;
    }
    false
}

/// Local search used when the remote AI service is unavailable or the answer
/// must be produced without it. Returns a formatted report; when nothing
/// matches, the report lists the available documents to guide the next query.
pub fn chat_fallback_search(documents: &[Document], query: &str, config: &SearchConfig) -> String {
    if documents.is_empty() {
        return "No documents available for local search.".to_string();
    }

    let clean = clean_query(query);
    let words: Vec<&str> = clean.split_whitespace().filter(|w| w.len() > 2).collect();

    let mut sections: Vec<String> = Vec::new();
    let mut total_matches = 0usize;

    for doc in documents {
        if doc.text.len() < config.min_content_chars {
            if doc.had_full_content {
                // Content existed in a prior session but only a preview was
                // restored; surface that instead of pretending to search.
                sections.push(format!(
                    "{} ({} chars):\n1. [Restored from a previous session - re-upload the file for full content search]\n",
                    doc.name,
                    doc.text.len()
                ));
                total_matches += 1;
            }
            continue;
        }

        let mut matches: Vec<(usize, String)> = Vec::new();
        for (index, sentence) in split_sentences(&doc.text) {
            if sentence.len() <= config.min_sentence_chars {
                continue;
            }
            if matches.len() >= config.chat_match_cap {
                break;
            }
            let sentence_lower = sentence.to_lowercase();
            if sentence_matches_fallback(&sentence_lower, &clean, &words) {
                matches.push((index + 1, sentence));
            }
        }

        if !matches.is_empty() {
            total_matches += matches.len();
            let mut section = format!("{} ({} chars):\n", doc.name, doc.text.len());
            for (number, text) in matches {
                let preview: String = text.chars().take(SNIPPET_CHARS).collect();
                let ellipsis = if text.chars().count() > SNIPPET_CHARS {
                    "..."
                } else {
                    ""
                };
                section.push_str(&format!("{}. {}{}\n", number, preview, ellipsis));
            }
            sections.push(section);
        }
    }

    if sections.is_empty() {
        let listing: Vec<String> = documents
            .iter()
            .map(|d| format!("- {} ({} characters)", d.name, d.text.len()))
            .collect();
        return format!(
            "No matches found for \"{}\".\n\nAvailable documents:\n{}\n\nTry searching for more specific keywords.",
            clean,
            listing.join("\n")
        );
    }

    format!(
        "Found {} matches in {} document(s):\n\n{}",
        total_matches,
        sections.len(),
        sections.join("\n")
    )
}
