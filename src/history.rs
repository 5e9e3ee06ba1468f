//! Client for the session-history service.
//!
//! History recording is best-effort: a failed write is logged and dropped,
//! never surfaced to the user or allowed to interrupt an answer in flight.
//! Only session creation and restore are load-bearing.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::backend::RemoteError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    /// Calendar bucket the service groups sessions under, e.g. `2026-08-24`.
    #[serde(default)]
    pub day_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RestoredDocument {
    pub name: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub had_full_content: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredMessage {
    pub sender: String,
    pub text: String,
}

/// Everything a restored session carries back into the workspace.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RestoredSession {
    #[serde(default)]
    pub document_details: Vec<RestoredDocument>,
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub messages: Vec<RestoredMessage>,
}

/// Both session endpoints wrap their payload in a `session` envelope.
#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    session: SessionInfo,
}

#[derive(Debug, Deserialize)]
struct RestoreEnvelope {
    session: RestoredSession,
}

/// Activity log the orchestrator records into. Recording methods are called
/// through the best-effort wrappers below, never directly.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn create_session(
        &self,
        user_id: &str,
        session_type: &str,
        title: &str,
    ) -> Result<SessionInfo, RemoteError>;

    async fn restore_session(&self, session_id: &str) -> Result<RestoredSession, RemoteError>;

    async fn record_document(
        &self,
        session_id: &str,
        name: &str,
        size: u64,
    ) -> Result<(), RemoteError>;

    async fn record_search(&self, session_id: &str, query: &str) -> Result<(), RemoteError>;

    async fn record_message(
        &self,
        session_id: &str,
        sender: &str,
        text: &str,
    ) -> Result<(), RemoteError>;
}

/// Record a document upload, swallowing failures.
pub async fn try_record_document(store: &dyn HistoryStore, session_id: &str, name: &str, size: u64) {
    if session_id.is_empty() {
        tracing::debug!(document = name, "no session, skipping document record");
        return;
    }
    if let Err(e) = store.record_document(session_id, name, size).await {
        tracing::warn!(document = name, error = %e, "failed to record document upload");
    }
}

/// Record a search query, swallowing failures.
pub async fn try_record_search(store: &dyn HistoryStore, session_id: &str, query: &str) {
    if session_id.is_empty() {
        tracing::debug!("no session, skipping search record");
        return;
    }
    if let Err(e) = store.record_search(session_id, query).await {
        tracing::warn!(error = %e, "failed to record search query");
    }
}

/// Record a chat message, swallowing failures.
pub async fn try_record_message(
    store: &dyn HistoryStore,
    session_id: &str,
    sender: &str,
    text: &str,
) {
    if session_id.is_empty() {
        tracing::debug!("no session, skipping message record");
        return;
    }
    if let Err(e) = store.record_message(session_id, sender, text).await {
        tracing::warn!(error = %e, "failed to record chat message");
    }
}

pub struct HttpHistoryStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHistoryStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_ok(&self, path: &str, body: serde_json::Value) -> Result<(), RemoteError> {
        let response = self.client.post(self.url(path)).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, message });
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn create_session(
        &self,
        user_id: &str,
        session_type: &str,
        title: &str,
    ) -> Result<SessionInfo, RemoteError> {
        let response = self
            .client
            .post(self.url("/api/history/session/new"))
            .json(&json!({
                "userId": user_id,
                "sessionType": session_type,
                "sessionTitle": title,
            }))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status,
                message: body,
            });
        }
        serde_json::from_str::<SessionEnvelope>(&body)
            .map(|envelope| envelope.session)
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn restore_session(&self, session_id: &str) -> Result<RestoredSession, RemoteError> {
        let response = self
            .client
            .post(self.url(&format!("/api/history/session/{}/restore", session_id)))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status,
                message: body,
            });
        }
        serde_json::from_str::<RestoreEnvelope>(&body)
            .map(|envelope| envelope.session)
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn record_document(
        &self,
        session_id: &str,
        name: &str,
        size: u64,
    ) -> Result<(), RemoteError> {
        self.post_ok(
            "/api/history/document/add",
            json!({
                "sessionId": session_id,
                "documentName": name,
                "documentSize": size,
            }),
        )
        .await
    }

    async fn record_search(&self, session_id: &str, query: &str) -> Result<(), RemoteError> {
        self.post_ok(
            "/api/history/search/add",
            json!({
                "sessionId": session_id,
                "query": query,
            }),
        )
        .await
    }

    async fn record_message(
        &self,
        session_id: &str,
        sender: &str,
        text: &str,
    ) -> Result<(), RemoteError> {
        self.post_ok(
            "/api/history/ai/message",
            json!({
                "sessionId": session_id,
                "sender": sender,
                "text": text,
            }),
        )
        .await
    }
}
