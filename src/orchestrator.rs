//! Question routing: local data queries, the remote AI service, and the
//! local fallback, behind client-side rate limits.
//!
//! Every ask resolves to exactly one assistant message, whatever route it
//! takes. Remote failures and soft rate-limit answers degrade to local
//! search so the user always gets something grounded in their documents.

use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::backend::{AiBackend, AskMetadata};
use crate::config::Config;
use crate::history::{self, HistoryStore, RestoredSession};
use crate::index::{DocumentIndex, SessionPhase};
use crate::models::{ChatMessage, Document, Speaker};
use crate::session::Session;
use crate::{query, search};

/// Phrases a 2xx answer can carry that mean the service did not actually
/// answer. Treated the same as a transport failure.
const SOFT_FAILURE_PHRASES: [&str; 2] = ["Rate limit exceeded", "high demand"];

/// How an ask was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerRoute {
    /// Nothing to ask about; no network traffic.
    NoDocuments,
    /// Client-side throttle refused the question; no network traffic.
    Blocked { wait_secs: u64 },
    /// Structured data query answered from local tables.
    LocalData,
    /// Remote AI service answered.
    Remote,
    /// Remote path failed; answered from local search instead.
    LocalFallback { reason: FallbackReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The service answered 2xx but the answer was a rate-limit apology.
    SoftRateLimit,
    RemoteError,
}

#[derive(Debug)]
pub struct AskOutcome {
    pub route: AnswerRoute,
    pub answer: String,
}

pub struct Orchestrator {
    backend: Arc<dyn AiBackend>,
    history: Arc<dyn HistoryStore>,
    config: Config,
    pub session: Session,
    pub index: DocumentIndex,
    messages: Vec<ChatMessage>,
    last_ask: Option<Instant>,
    last_summary: Option<Instant>,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn AiBackend>,
        history: Arc<dyn HistoryStore>,
        config: Config,
        session: Session,
    ) -> Self {
        Self {
            backend,
            history,
            config,
            session,
            index: DocumentIndex::new(),
            messages: Vec::new(),
            last_ask: None,
            last_summary: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn push(&mut self, speaker: Speaker, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(speaker, content));
    }

    /// Seconds (rounded up) until the throttle admits another call.
    fn throttle_remaining(last: Option<Instant>, interval: Duration) -> Option<u64> {
        let last = last?;
        let elapsed = last.elapsed();
        if elapsed >= interval {
            return None;
        }
        let remaining = interval - elapsed;
        Some(remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0))
    }

    fn is_data_query(question: &str) -> bool {
        if question.contains('>') || question.contains('<') || question.contains('=') {
            return true;
        }
        match Regex::new(r"(?i)\b(age|income|score|genre|gender|customer|id|where)\b|\d") {
            Ok(re) => re.is_match(question),
            Err(_) => false,
        }
    }

    /// Answer a question. Pushes the user message and exactly one assistant
    /// message, then returns the route taken and the answer text.
    pub async fn ask(&mut self, raw_question: &str) -> AskOutcome {
        let question = search::clean_query(raw_question);
        self.push(Speaker::User, raw_question.trim());

        if self.index.is_empty() {
            let answer =
                "Please upload documents first. I can only answer questions about documents in the current session.";
            self.push(Speaker::Assistant, answer);
            return AskOutcome {
                route: AnswerRoute::NoDocuments,
                answer: answer.to_string(),
            };
        }

        let interval = Duration::from_secs(self.config.limits.ask_interval_secs);
        if let Some(wait_secs) = Self::throttle_remaining(self.last_ask, interval) {
            let answer = format!(
                "Please wait {} second{} before asking another question.",
                wait_secs,
                if wait_secs == 1 { "" } else { "s" }
            );
            self.push(Speaker::Assistant, answer.clone());
            return AskOutcome {
                route: AnswerRoute::Blocked { wait_secs },
                answer,
            };
        }

        let is_data_query = Self::is_data_query(&question);

        if is_data_query && self.index.has_table_data() {
            let answer = query::run_query(self.index.all(), &question);
            self.push(Speaker::Assistant, answer.clone());
            self.record_exchange(raw_question, &answer).await;
            return AskOutcome {
                route: AnswerRoute::LocalData,
                answer,
            };
        }

        let mut outbound = if is_data_query {
            format!("DATA_QUERY: {}", question)
        } else {
            question.clone()
        };
        let restored = self.index.any_from_session();
        if restored {
            let tail: String = self
                .session
                .id
                .chars()
                .rev()
                .take(8)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            outbound.push_str(&format!(" (Session: {})", tail));
        }

        let metadata = AskMetadata {
            user_id: self.session.user_id.clone(),
            session_id: self.session.id.clone(),
            document_count: self.index.len(),
            original_question: raw_question.trim().to_string(),
            is_data_query,
            has_table_data: self.index.has_table_data(),
        };

        self.last_ask = Some(Instant::now());
        match self.backend.ask(&outbound, &metadata, restored).await {
            Ok(response) => {
                let answer = response.answer.unwrap_or_default();
                if answer.is_empty()
                    || SOFT_FAILURE_PHRASES.iter().any(|p| answer.contains(p))
                {
                    tracing::info!("AI service is saturated, answering locally");
                    let fallback =
                        self.local_answer(&question, is_data_query, FallbackReason::SoftRateLimit);
                    self.push(Speaker::Assistant, fallback.clone());
                    return AskOutcome {
                        route: AnswerRoute::LocalFallback {
                            reason: FallbackReason::SoftRateLimit,
                        },
                        answer: fallback,
                    };
                }
                self.push(Speaker::Assistant, answer.clone());
                self.record_exchange(raw_question, &answer).await;
                AskOutcome {
                    route: AnswerRoute::Remote,
                    answer,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "AI service request failed, answering locally");
                let fallback =
                    self.local_answer(&question, is_data_query, FallbackReason::RemoteError);
                self.push(Speaker::Assistant, fallback.clone());
                AskOutcome {
                    route: AnswerRoute::LocalFallback {
                        reason: FallbackReason::RemoteError,
                    },
                    answer: fallback,
                }
            }
        }
    }

    fn local_answer(
        &self,
        question: &str,
        is_data_query: bool,
        reason: FallbackReason,
    ) -> String {
        let body = if is_data_query && self.index.has_table_data() {
            query::run_query(self.index.all(), question)
        } else {
            search::chat_fallback_search(self.index.all(), question, &self.config.search)
        };
        let note = match reason {
            FallbackReason::SoftRateLimit => {
                "The AI service is currently busy; here are local search results instead."
            }
            FallbackReason::RemoteError => {
                "The AI service could not be reached; here are local search results instead."
            }
        };
        format!("{}\n\n{}", note, body)
    }

    async fn record_exchange(&mut self, question: &str, answer: &str) {
        if self.session.is_local() {
            return;
        }
        if self.session.should_record("message", question) {
            history::try_record_message(self.history.as_ref(), &self.session.id, "user", question)
                .await;
            history::try_record_message(self.history.as_ref(), &self.session.id, "ai", answer)
                .await;
        }
    }

    /// Summarize the loaded documents, remote-first with a local fallback.
    pub async fn summarize(&mut self) -> String {
        if self.index.is_empty() {
            return "No documents to summarize. Upload documents first.".to_string();
        }
        let interval = Duration::from_secs(self.config.limits.summary_interval_secs);
        if let Some(wait_secs) = Self::throttle_remaining(self.last_summary, interval) {
            return format!(
                "Please wait {} second{} before requesting another summary.",
                wait_secs,
                if wait_secs == 1 { "" } else { "s" }
            );
        }
        self.last_summary = Some(Instant::now());

        match self.backend.summary().await {
            Ok(response) => {
                let summary = response.summary.unwrap_or_default();
                if summary.is_empty()
                    || SOFT_FAILURE_PHRASES.iter().any(|p| summary.contains(p))
                {
                    self.local_summary()
                } else {
                    summary
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote summary failed, generating locally");
                self.local_summary()
            }
        }
    }

    /// Structural summary built without the AI service: overview, per-file
    /// breakdown, and simple observations.
    pub fn local_summary(&self) -> String {
        let docs = self.index.all();
        let total_chars: usize = docs.iter().map(|d| d.text.len()).sum();
        let csv_count = docs.iter().filter(|d| d.is_table()).count();
        let text_count = docs.len() - csv_count;

        let mut out = format!(
            "DOCUMENT OVERVIEW\n{} document{} loaded ({} characters total): {} tabular, {} text.\n\n",
            docs.len(),
            if docs.len() == 1 { "" } else { "s" },
            total_chars,
            csv_count,
            text_count
        );

        for doc in docs {
            out.push_str(&format!("FILE: {}\n", doc.name));
            if let Some(table) = doc.table.as_ref().filter(|t| !t.rows.is_empty()) {
                out.push_str(&format!(
                    "  {} records, columns: {}\n",
                    table.rows.len(),
                    table.headers.join(", ")
                ));
                if let Some(first) = table.rows.first() {
                    let sample: Vec<String> = table
                        .headers
                        .iter()
                        .take(4)
                        .map(|h| {
                            format!(
                                "{}={}",
                                h,
                                first.get(h).map(|c| c.to_string()).unwrap_or_default()
                            )
                        })
                        .collect();
                    out.push_str(&format!("  sample record: {}\n", sample.join(", ")));
                }
            } else {
                let words = doc.text.split_whitespace().count();
                let sentences = search::split_sentences(&doc.text)
                    .iter()
                    .filter(|(_, s)| s.len() > 20)
                    .count();
                let density = if sentences > 0 { words / sentences } else { 0 };
                out.push_str(&format!(
                    "  {} characters, {} words, {} substantive sentences (~{} words/sentence)\n",
                    doc.text.len(),
                    words,
                    sentences,
                    density
                ));
            }
            out.push('\n');
        }

        out.push_str("OBSERVATIONS\n");
        if let Some(largest) = docs.iter().max_by_key(|d| d.text.len()) {
            out.push_str(&format!(
                "  Largest document: {} ({} characters).\n",
                largest.name,
                largest.text.len()
            ));
        }
        if csv_count > 0 {
            out.push_str("  Tabular data is loaded; structured queries like \"age > 30\" are available.\n");
        }
        if docs.iter().any(|d| d.from_session) {
            out.push_str("  Some documents were restored from a previous session and may hold previews only.\n");
        }
        out.push_str(
            "\nThis summary was generated locally from document structure, without the AI service.",
        );
        out
    }

    /// Rebuild the workspace from a stored session: documents, search
    /// history, and the visible conversation.
    pub async fn restore(&mut self, session_id: &str) -> anyhow::Result<usize> {
        self.index.transition(SessionPhase::Restoring)?;
        let restored: RestoredSession = self.history.restore_session(session_id).await?;

        let documents: Vec<Document> = restored
            .document_details
            .iter()
            .map(|d| Document {
                id: uuid::Uuid::new_v4().to_string(),
                name: d.name.clone(),
                mime_hint: crate::extract::mime_hint_for(&d.name).to_string(),
                size_bytes: d.size,
                text: d
                    .content
                    .clone()
                    .unwrap_or_else(|| format!("[Restored document: {}]", d.name)),
                table: None,
                uploaded_at: chrono::Utc::now(),
                from_session: true,
                had_full_content: d.had_full_content,
            })
            .collect();
        let count = documents.len();
        self.index.replace_all(documents);
        if self.index.phase() != SessionPhase::Ready && count == 0 {
            // replace_all already moved to Empty for a documentless session.
            tracing::debug!(session = session_id, "restored session held no documents");
        }

        self.messages = restored
            .messages
            .iter()
            .map(|m| {
                let speaker = match m.sender.as_str() {
                    "user" => Speaker::User,
                    "system" => Speaker::System,
                    _ => Speaker::Assistant,
                };
                ChatMessage {
                    speaker,
                    content: m.text.clone(),
                    timestamp: chrono::Utc::now(),
                    restored: true,
                }
            })
            .collect();

        self.session.id = session_id.to_string();
        for query_text in &restored.search_queries {
            // Pre-seed the dedup guard so restored queries are not re-recorded.
            self.session.should_record("search", query_text);
        }
        Ok(count)
    }

    /// Drop all documents and the conversation. The backend's document store
    /// is cleared best-effort.
    pub async fn clear(&mut self) {
        self.index.clear();
        self.messages.clear();
        match self.backend.clear_documents().await {
            Ok(response) => {
                tracing::info!(cleared = response.cleared_count, "backend documents cleared")
            }
            Err(e) => tracing::warn!(error = %e, "failed to clear backend documents"),
        }
    }
}
