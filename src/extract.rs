//! Multi-format content extraction for uploaded documents.
//!
//! Dispatch is by filename extension with the declared content type as a
//! tie-breaker. Formats degrade differently on failure: PDF and legacy DOC
//! resolve to a descriptive placeholder so a partially failed batch stays
//! usable, while DOCX, TXT, and CSV failures indicate a genuinely malformed
//! upload and are reported as errors.

use std::io::Read;
use thiserror::Error;

use crate::models::ExtractionResult;
use crate::tabular;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_CSV: &str = "text/csv";
pub const MIME_TXT: &str = "text/plain";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Unrecognized extension/MIME combination; the upload is rejected and
    /// the rest of the batch continues.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("failed to read DOCX {name}: {reason}")]
    Docx { name: String, reason: String },
    #[error("text file {0} is empty")]
    EmptyText(String),
    #[error("file {0} is not valid UTF-8 text")]
    NotUtf8(String),
}

/// Infer a content type from the filename, used when the caller has none.
pub fn mime_hint_for(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.ends_with(".pdf") {
        MIME_PDF
    } else if lower.ends_with(".docx") {
        MIME_DOCX
    } else if lower.ends_with(".doc") {
        MIME_DOC
    } else if lower.ends_with(".csv") {
        MIME_CSV
    } else if lower.ends_with(".txt") {
        MIME_TXT
    } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        MIME_XLSX
    } else {
        "application/octet-stream"
    }
}

/// True when the extension/MIME combination is one we recognize at all
/// (including formats that only yield placeholders).
pub fn is_supported(name: &str, mime_hint: &str) -> bool {
    let lower = name.to_lowercase();
    [".pdf", ".docx", ".doc", ".csv", ".txt", ".xlsx", ".xls"]
        .iter()
        .any(|ext| lower.ends_with(ext))
        || matches!(mime_hint, MIME_PDF | MIME_DOCX | MIME_DOC | MIME_CSV | MIME_TXT)
}

/// Extract a text view (and, for CSV, a structured table) from raw bytes.
///
/// The result's `text` is never empty: formats without reliable client-side
/// extraction resolve to a placeholder describing the limitation, so every
/// ingested document remains visible to search and chat.
pub fn extract(bytes: &[u8], name: &str, mime_hint: &str) -> Result<ExtractionResult, ExtractError> {
    let lower = name.to_lowercase();

    if lower.ends_with(".csv") || mime_hint == MIME_CSV {
        let text = String::from_utf8_lossy(bytes);
        let parsed = tabular::parse_csv(&text, name);
        return Ok(ExtractionResult {
            text: parsed.content,
            table: if parsed.is_table {
                Some(crate::models::Table {
                    headers: parsed.headers,
                    rows: parsed.rows,
                    id_column: parsed.metadata.id_column,
                    parse_errors: parsed.metadata.parse_errors,
                })
            } else {
                None
            },
        });
    }

    if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        // Spreadsheet contents are only parsed server-side.
        return Ok(ExtractionResult::text_only(format!(
            "[Spreadsheet file: {}] - Excel workbooks require server-side processing; \
             contents are not searchable locally.",
            name
        )));
    }

    if lower.ends_with(".docx") || mime_hint == MIME_DOCX {
        return extract_docx(bytes, name).map(ExtractionResult::text_only);
    }

    if lower.ends_with(".pdf") || mime_hint == MIME_PDF {
        return Ok(ExtractionResult::text_only(extract_pdf(bytes, name)));
    }

    if lower.ends_with(".doc") {
        return Ok(ExtractionResult::text_only(format!(
            "[DOC file: {}] - Legacy DOC files have limited support. \
             Convert to DOCX or PDF for full text search.",
            name
        )));
    }

    if lower.ends_with(".txt") || mime_hint == MIME_TXT {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| ExtractError::NotUtf8(name.to_string()))?
            .trim()
            .to_string();
        if text.is_empty() {
            return Err(ExtractError::EmptyText(name.to_string()));
        }
        return Ok(ExtractionResult::text_only(text));
    }

    Err(ExtractError::UnsupportedFileType(format!(
        "{} ({})",
        name, mime_hint
    )))
}

/// PDF extraction degrades to a placeholder: the rest of the batch, and chat
/// over the other documents, must keep working when one PDF is unreadable.
fn extract_pdf(bytes: &[u8], name: &str) -> String {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => format!(
            "[PDF file: {}] - No extractable text found. The document may be scanned images.",
            name
        ),
        Err(e) => {
            tracing::warn!(file = name, error = %e, "PDF text extraction failed");
            format!(
                "[PDF file: {}] - Could not extract text. Search is limited to the filename.",
                name
            )
        }
    }
}

fn extract_docx(bytes: &[u8], name: &str) -> Result<String, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Docx {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| ExtractError::Docx {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        if entry.name() == "word/document.xml" {
            entry
                .take(MAX_XML_ENTRY_BYTES)
                .read_to_end(&mut doc_xml)
                .map_err(|e| ExtractError::Docx {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
            if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
                return Err(ExtractError::Docx {
                    name: name.to_string(),
                    reason: "word/document.xml exceeds size limit".to_string(),
                });
            }
            found = true;
            break;
        }
    }
    if !found {
        return Err(ExtractError::Docx {
            name: name.to_string(),
            reason: "word/document.xml not found".to_string(),
        });
    }
    let text = extract_w_t_elements(&doc_xml, name)?;
    if text.trim().is_empty() {
        return Err(ExtractError::Docx {
            name: name.to_string(),
            reason: "no text content found".to_string(),
        });
    }
    Ok(text.trim().to_string())
}

fn extract_w_t_elements(xml: &[u8], name: &str) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::Docx {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docx_with_text(phrase: &str) -> Vec<u8> {
        use std::io::Write;
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
                phrase
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn unrecognized_type_is_rejected() {
        let err = extract(b"binary", "movie.mp4", "video/mp4").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFileType(_)));
    }

    #[test]
    fn invalid_pdf_degrades_to_placeholder() {
        let result = extract(b"not a pdf", "report.pdf", MIME_PDF).unwrap();
        assert!(result.text.contains("report.pdf"));
        assert!(result.text.contains("Could not extract text"));
    }

    #[test]
    fn invalid_docx_is_an_error_with_filename() {
        let err = extract(b"not a zip", "notes.docx", MIME_DOCX).unwrap_err();
        match err {
            ExtractError::Docx { name, .. } => assert_eq!(name, "notes.docx"),
            other => panic!("expected Docx error, got {:?}", other),
        }
    }

    #[test]
    fn docx_text_is_extracted() {
        let bytes = docx_with_text("quarterly revenue discussion");
        let result = extract(&bytes, "minutes.docx", MIME_DOCX).unwrap();
        assert!(result.text.contains("quarterly revenue discussion"));
        assert!(!result.is_table());
    }

    #[test]
    fn empty_txt_is_an_error() {
        let err = extract(b"   \n  ", "empty.txt", MIME_TXT).unwrap_err();
        assert!(matches!(err, ExtractError::EmptyText(_)));
    }

    #[test]
    fn txt_is_trimmed() {
        let result = extract(b"  hello world  \n", "a.txt", MIME_TXT).unwrap();
        assert_eq!(result.text, "hello world");
    }

    #[test]
    fn xlsx_yields_deferral_placeholder() {
        let result = extract(b"whatever", "sheet.xlsx", MIME_XLSX).unwrap();
        assert!(result.text.contains("server-side processing"));
        assert!(!result.is_table());
    }

    #[test]
    fn doc_yields_fixed_placeholder() {
        let result = extract(b"\xd0\xcf\x11\xe0", "old.doc", MIME_DOC).unwrap();
        assert!(result.text.contains("limited support"));
    }

    #[test]
    fn csv_produces_table() {
        let result = extract(b"id,age\n1,30\n2,40\n", "people.csv", MIME_CSV).unwrap();
        assert!(result.is_table());
        let table = result.table.unwrap();
        assert_eq!(table.headers, vec!["id", "age"]);
        assert_eq!(table.rows.len(), 2);
    }
}
