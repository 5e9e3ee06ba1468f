//! Batch file ingestion: validate, read, extract, and index uploads.
//!
//! The batch is read concurrently but indexed in input order, so document
//! order in the session matches the order the user supplied. One bad file
//! never aborts the batch.

use std::path::{Path, PathBuf};

use futures::future::join_all;

use crate::backend::AiBackend;
use crate::extract;
use crate::history::{self, HistoryStore};
use crate::index::{AddOutcome, DocumentIndex, SessionPhase};
use crate::models::Document;
use crate::session::Session;

/// Per-batch outcome, in input order within each bucket.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub added: Vec<String>,
    /// Filenames already present in the session; skipped unchanged.
    pub duplicates: Vec<String>,
    /// (filename, reason) for files that could not be ingested.
    pub rejected: Vec<(String, String)>,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.duplicates.is_empty() && self.rejected.is_empty()
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Ingest a batch of files into the session index, then push the accepted
/// ones to the backend's document store (best-effort, upload-guarded).
pub async fn ingest(
    index: &mut DocumentIndex,
    session: &mut Session,
    backend: &dyn AiBackend,
    history: &dyn HistoryStore,
    paths: &[PathBuf],
) -> IngestReport {
    let mut report = IngestReport::default();
    if paths.is_empty() {
        return report;
    }

    if let Err(e) = index.transition(SessionPhase::Initializing) {
        tracing::debug!(error = %e, "session phase unchanged during ingest");
    }

    let reads = join_all(paths.iter().map(tokio::fs::read)).await;

    let mut uploads: Vec<(String, Vec<u8>)> = Vec::new();
    for (path, read) in paths.iter().zip(reads) {
        let name = file_name_of(path);
        let bytes = match read {
            Ok(bytes) => bytes,
            Err(e) => {
                report.rejected.push((name, format!("read failed: {}", e)));
                continue;
            }
        };

        let mime_hint = extract::mime_hint_for(&name);
        if !extract::is_supported(&name, mime_hint) {
            report
                .rejected
                .push((name, "unsupported file type".to_string()));
            continue;
        }

        let extracted = match extract::extract(&bytes, &name, mime_hint) {
            Ok(extracted) => extracted,
            Err(e) => {
                report.rejected.push((name, e.to_string()));
                continue;
            }
        };

        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.clone(),
            mime_hint: mime_hint.to_string(),
            size_bytes: bytes.len() as u64,
            text: extracted.text,
            table: extracted.table,
            uploaded_at: chrono::Utc::now(),
            from_session: false,
            had_full_content: false,
        };
        let size = document.size_bytes;

        match index.add(document) {
            AddOutcome::Added => {
                if !session.is_local() && session.should_record("document", &name) {
                    history::try_record_document(history, &session.id, &name, size).await;
                }
                uploads.push((name.clone(), bytes));
                report.added.push(name);
            }
            AddOutcome::Duplicate => report.duplicates.push(name),
        }
    }

    if let Err(e) = index.transition(SessionPhase::Ready) {
        tracing::debug!(error = %e, "session phase unchanged after ingest");
    }

    if !uploads.is_empty() {
        if session.upload_allowed() {
            match backend.upload_many(uploads).await {
                Ok(result) => tracing::info!(
                    uploaded = result.success_count,
                    failed = result.fail_count,
                    "backend document upload finished"
                ),
                Err(e) => tracing::warn!(error = %e, "backend document upload failed"),
            }
        } else {
            tracing::info!("backend upload skipped, attempted too recently");
        }
    }

    report
}
