//! In-memory document index scoped to one working session.
//!
//! Documents are ordered by ingestion and unique by filename; two uploads of
//! the same name are the same logical document and the second is rejected.
//! The index also carries the session lifecycle phase, with transitions
//! validated against the phases that can legally follow each other.

use thiserror::Error;

use crate::models::Document;

/// Lifecycle of the working session that owns the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No documents, nothing in flight.
    Empty,
    /// Fresh uploads are being extracted.
    Initializing,
    /// Documents available, search and chat enabled.
    Ready,
    /// A prior session is being rebuilt from the history service.
    Restoring,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid session transition: {from:?} -> {to:?}")]
pub struct PhaseError {
    pub from: SessionPhase,
    pub to: SessionPhase,
}

/// Outcome of [`DocumentIndex::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// A document with the same name already exists; the index is unchanged.
    Duplicate,
}

#[derive(Debug, Default)]
pub struct DocumentIndex {
    documents: Vec<Document>,
    phase: Option<SessionPhase>,
}

impl DocumentIndex {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
            phase: Some(SessionPhase::Empty),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.unwrap_or(SessionPhase::Empty)
    }

    /// Move to a new phase, rejecting transitions that the UI flow can never
    /// legally produce (e.g. Restoring while uploads are mid-extraction).
    pub fn transition(&mut self, to: SessionPhase) -> Result<(), PhaseError> {
        use SessionPhase::*;
        let from = self.phase();
        let allowed = matches!(
            (from, to),
            (Empty, Initializing)
                | (Empty, Restoring)
                | (Initializing, Ready)
                | (Restoring, Ready)
                | (Ready, Initializing)
                | (Ready, Restoring)
                | (_, Empty)
        );
        if !allowed {
            return Err(PhaseError { from, to });
        }
        self.phase = Some(to);
        Ok(())
    }

    /// Add one document; rejected (no-op) when the name is already present.
    pub fn add(&mut self, document: Document) -> AddOutcome {
        if self.documents.iter().any(|d| d.name == document.name) {
            return AddOutcome::Duplicate;
        }
        self.documents.push(document);
        AddOutcome::Added
    }

    /// Replace the whole index, used when a new working session begins.
    pub fn replace_all(&mut self, documents: Vec<Document>) {
        self.documents = documents;
        self.phase = Some(if self.documents.is_empty() {
            SessionPhase::Empty
        } else {
            SessionPhase::Ready
        });
    }

    /// Empty the index. The caller is responsible for notifying the backend
    /// document-clear endpoint (fire-and-forget).
    pub fn clear(&mut self) {
        self.documents.clear();
        self.phase = Some(SessionPhase::Empty);
    }

    /// Documents of the active session, in ingestion order.
    pub fn all(&self) -> &[Document] {
        &self.documents
    }

    pub fn get(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True when at least one document carries non-empty tabular data.
    pub fn has_table_data(&self) -> bool {
        self.documents.iter().any(|d| d.is_table())
    }

    pub fn any_from_session(&self) -> bool {
        self.documents.iter().any(|d| d.from_session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(name: &str) -> Document {
        Document {
            id: format!("id-{}", name),
            name: name.to_string(),
            mime_hint: "text/plain".into(),
            size_bytes: 10,
            text: "some document text".into(),
            table: None,
            uploaded_at: Utc::now(),
            from_session: false,
            had_full_content: false,
        }
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut index = DocumentIndex::new();
        assert_eq!(index.add(doc("report.txt")), AddOutcome::Added);
        assert_eq!(index.add(doc("report.txt")), AddOutcome::Duplicate);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn replace_all_resets_contents() {
        let mut index = DocumentIndex::new();
        index.add(doc("a.txt"));
        index.replace_all(vec![doc("b.txt"), doc("c.txt")]);
        assert_eq!(index.len(), 2);
        assert!(index.get("a.txt").is_none());
        assert_eq!(index.phase(), SessionPhase::Ready);
    }

    #[test]
    fn clear_empties_and_resets_phase() {
        let mut index = DocumentIndex::new();
        index.add(doc("a.txt"));
        index.transition(SessionPhase::Initializing).unwrap();
        index.transition(SessionPhase::Ready).unwrap();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.phase(), SessionPhase::Empty);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut index = DocumentIndex::new();
        assert!(index.transition(SessionPhase::Ready).is_err());
        index.transition(SessionPhase::Initializing).unwrap();
        let err = index.transition(SessionPhase::Restoring).unwrap_err();
        assert_eq!(err.from, SessionPhase::Initializing);
    }

    #[test]
    fn ready_session_can_switch_to_restoring() {
        let mut index = DocumentIndex::new();
        index.transition(SessionPhase::Restoring).unwrap();
        index.transition(SessionPhase::Ready).unwrap();
        assert!(index.transition(SessionPhase::Restoring).is_ok());
    }
}
