//! HTTP client for the remote AI backend.
//!
//! All remote calls go through the [`AiBackend`] trait so the orchestrator
//! can be exercised against a mock. The concrete client talks JSON to the
//! backend's `/api/ai/*` endpoints.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// Non-2xx response; `message` is the server's error body when present.
    #[error("backend returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend response could not be decoded: {0}")]
    Decode(String),
    /// 2xx response whose body reports `success: false`.
    #[error("backend reported failure: {0}")]
    Service(String),
}

/// Context sent alongside every ask so the backend can scope its answer to
/// the caller's working session.
#[derive(Debug, Clone)]
pub struct AskMetadata {
    pub user_id: String,
    pub session_id: String,
    pub document_count: usize,
    pub original_question: String,
    pub is_data_query: bool,
    pub has_table_data: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub documents_analyzed: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub documents_analyzed: Option<u64>,
    #[serde(default)]
    pub document_names: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadManyResponse {
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub fail_count: u64,
    #[serde(default)]
    pub success_files: Vec<String>,
    #[serde(default)]
    pub failed_files: Vec<String>,
    #[serde(default)]
    pub total_documents: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub cleared_count: u64,
}

/// The remote AI surface the orchestrator depends on.
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn ask(
        &self,
        question: &str,
        metadata: &AskMetadata,
        restored_session: bool,
    ) -> Result<AskResponse, RemoteError>;

    async fn summary(&self) -> Result<SummaryResponse, RemoteError>;

    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<(), RemoteError>;

    async fn upload_many(
        &self,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<UploadManyResponse, RemoteError>;

    async fn clear_documents(&self) -> Result<ClearResponse, RemoteError>;
}

pub struct HttpAiBackend {
    client: reqwest::Client,
    /// Client with a short overall deadline, used for restored-session asks
    /// where the backend may no longer hold the documents.
    restored_client: reqwest::Client,
    base_url: String,
}

impl HttpAiBackend {
    pub fn new(base_url: &str, restored_ask_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            restored_client: reqwest::Client::builder()
                .timeout(restored_ask_timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RemoteError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or(body);
        return Err(RemoteError::Status { status, message });
    }
    serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl AiBackend for HttpAiBackend {
    async fn ask(
        &self,
        question: &str,
        metadata: &AskMetadata,
        restored_session: bool,
    ) -> Result<AskResponse, RemoteError> {
        let client = if restored_session {
            &self.restored_client
        } else {
            &self.client
        };
        let body = json!({
            "question": question,
            "metadata": {
                "userId": metadata.user_id,
                "sessionId": metadata.session_id,
                "documentCount": metadata.document_count,
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "originalQuestion": metadata.original_question,
                "isDataQuery": metadata.is_data_query,
                "hasTableData": metadata.has_table_data,
            },
        });
        let response = client
            .post(self.url("/api/ai/ask"))
            .json(&body)
            .send()
            .await?;
        let parsed: AskResponse = decode_json(response).await?;
        if !parsed.success {
            return Err(RemoteError::Service(
                parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(parsed)
    }

    async fn summary(&self) -> Result<SummaryResponse, RemoteError> {
        let response = self.client.get(self.url("/api/ai/summary")).send().await?;
        let parsed: SummaryResponse = decode_json(response).await?;
        if !parsed.success {
            return Err(RemoteError::Service(
                parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(parsed)
    }

    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<(), RemoteError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("document", part);
        let response = self
            .client
            .post(self.url("/api/ai/upload"))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, message });
        }
        Ok(())
    }

    async fn upload_many(
        &self,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<UploadManyResponse, RemoteError> {
        let mut form = reqwest::multipart::Form::new();
        for (filename, bytes) in files {
            let part = reqwest::multipart::Part::bytes(bytes).file_name(filename);
            form = form.part("documents", part);
        }
        let response = self
            .client
            .post(self.url("/api/ai/upload/multiple"))
            .multipart(form)
            .send()
            .await?;
        decode_json(response).await
    }

    async fn clear_documents(&self) -> Result<ClearResponse, RemoteError> {
        let response = self
            .client
            .delete(self.url("/api/ai/documents"))
            .send()
            .await?;
        decode_json(response).await
    }
}
