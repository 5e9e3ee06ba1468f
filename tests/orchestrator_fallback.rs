//! Ask routing under failure: remote errors degrade to local answers,
//! client-side throttling blocks before any network call, and the HTTP
//! client surfaces backend error statuses.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use docdesk::backend::{
    AiBackend, AskMetadata, AskResponse, ClearResponse, HttpAiBackend, RemoteError,
    SummaryResponse, UploadManyResponse,
};
use docdesk::config::{Config, SessionConfig};
use docdesk::history::{HistoryStore, RestoredSession, SessionInfo};
use docdesk::models::{Document, Speaker};
use docdesk::orchestrator::{AnswerRoute, FallbackReason, Orchestrator};
use docdesk::session::Session;

/// Scripted backend: every ask returns the configured result and counts.
struct ScriptedBackend {
    ask_calls: Arc<AtomicUsize>,
    answer: Result<String, ()>,
}

#[async_trait]
impl AiBackend for ScriptedBackend {
    async fn ask(
        &self,
        _question: &str,
        _metadata: &AskMetadata,
        _restored: bool,
    ) -> Result<AskResponse, RemoteError> {
        self.ask_calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Ok(answer) => Ok(AskResponse {
                success: true,
                answer: Some(answer.clone()),
                documents_analyzed: Some(1),
                error: None,
            }),
            Err(()) => Err(RemoteError::Service("backend exploded".into())),
        }
    }

    async fn summary(&self) -> Result<SummaryResponse, RemoteError> {
        Err(RemoteError::Service("backend exploded".into()))
    }

    async fn upload(&self, _filename: &str, _bytes: Vec<u8>) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn upload_many(
        &self,
        _files: Vec<(String, Vec<u8>)>,
    ) -> Result<UploadManyResponse, RemoteError> {
        Err(RemoteError::Service("backend exploded".into()))
    }

    async fn clear_documents(&self) -> Result<ClearResponse, RemoteError> {
        Ok(ClearResponse {
            message: None,
            cleared_count: 0,
        })
    }
}

struct NullHistory;

#[async_trait]
impl HistoryStore for NullHistory {
    async fn create_session(
        &self,
        _user_id: &str,
        _session_type: &str,
        _title: &str,
    ) -> Result<SessionInfo, RemoteError> {
        Err(RemoteError::Service("down".into()))
    }
    async fn restore_session(&self, _session_id: &str) -> Result<RestoredSession, RemoteError> {
        Err(RemoteError::Service("down".into()))
    }
    async fn record_document(
        &self,
        _session_id: &str,
        _name: &str,
        _size: u64,
    ) -> Result<(), RemoteError> {
        Ok(())
    }
    async fn record_search(&self, _session_id: &str, _query: &str) -> Result<(), RemoteError> {
        Ok(())
    }
    async fn record_message(
        &self,
        _session_id: &str,
        _sender: &str,
        _text: &str,
    ) -> Result<(), RemoteError> {
        Ok(())
    }
}

fn text_doc(name: &str, text: &str) -> Document {
    Document {
        id: format!("id-{}", name),
        name: name.to_string(),
        mime_hint: "text/plain".into(),
        size_bytes: text.len() as u64,
        text: text.to_string(),
        table: None,
        uploaded_at: Utc::now(),
        from_session: false,
        had_full_content: false,
    }
}

fn orchestrator_with(backend: ScriptedBackend) -> Orchestrator {
    let session = Session::local(&SessionConfig::default());
    Orchestrator::new(
        Arc::new(backend),
        Arc::new(NullHistory),
        Config::minimal(),
        session,
    )
}

const REPORT_TEXT: &str = "The quarterly revenue increased by twelve percent over the prior year. \
    Operating costs stayed flat across every region we track. \
    Management attributed the growth to the new subscription offering.";

#[tokio::test]
async fn remote_failure_degrades_to_exactly_one_local_answer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut orchestrator = orchestrator_with(ScriptedBackend {
        ask_calls: calls.clone(),
        answer: Err(()),
    });
    orchestrator.index.add(text_doc("report.txt", REPORT_TEXT));

    let outcome = orchestrator.ask("tell me about revenue").await;

    assert_eq!(
        outcome.route,
        AnswerRoute::LocalFallback {
            reason: FallbackReason::RemoteError
        }
    );
    assert!(outcome.answer.contains("could not be reached"));
    assert!(outcome.answer.contains("quarterly revenue"));
    let assistant_count = orchestrator
        .messages()
        .iter()
        .filter(|m| m.speaker == Speaker::Assistant)
        .count();
    assert_eq!(assistant_count, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn soft_rate_limit_answer_is_replaced_by_local_results() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut orchestrator = orchestrator_with(ScriptedBackend {
        ask_calls: calls.clone(),
        answer: Ok("Rate limit exceeded. Please try again later.".into()),
    });
    orchestrator.index.add(text_doc("report.txt", REPORT_TEXT));

    let outcome = orchestrator.ask("tell me about revenue").await;

    assert_eq!(
        outcome.route,
        AnswerRoute::LocalFallback {
            reason: FallbackReason::SoftRateLimit
        }
    );
    assert!(outcome.answer.contains("busy"));
    assert!(!outcome.answer.contains("Rate limit exceeded"));
}

#[tokio::test]
async fn second_ask_within_interval_is_blocked_without_network() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut orchestrator = orchestrator_with(ScriptedBackend {
        ask_calls: calls.clone(),
        answer: Ok("A perfectly good answer about your documents.".into()),
    });
    orchestrator.index.add(text_doc("report.txt", REPORT_TEXT));

    let first = orchestrator.ask("tell me about revenue").await;
    assert_eq!(first.route, AnswerRoute::Remote);

    let second = orchestrator.ask("and about costs please").await;
    assert!(matches!(second.route, AnswerRoute::Blocked { wait_secs } if wait_secs <= 6));
    assert!(second.answer.contains("Please wait"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_index_answers_without_network() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut orchestrator = orchestrator_with(ScriptedBackend {
        ask_calls: calls.clone(),
        answer: Ok("unused".into()),
    });

    let outcome = orchestrator.ask("anything at all").await;
    assert_eq!(outcome.route, AnswerRoute::NoDocuments);
    assert!(outcome.answer.contains("upload documents first"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn data_query_over_tables_never_leaves_the_process() {
    use docdesk::models::{CellValue, Table};

    let calls = Arc::new(AtomicUsize::new(0));
    let mut orchestrator = orchestrator_with(ScriptedBackend {
        ask_calls: calls.clone(),
        answer: Ok("unused".into()),
    });
    let mut doc = text_doc("ages.csv", "csv placeholder text");
    doc.table = Some(Table {
        headers: vec!["id".into(), "age".into()],
        rows: vec![
            [
                ("id".to_string(), CellValue::Int(1)),
                ("age".to_string(), CellValue::Int(30)),
            ]
            .into_iter()
            .collect(),
            [
                ("id".to_string(), CellValue::Int(2)),
                ("age".to_string(), CellValue::Int(40)),
            ]
            .into_iter()
            .collect(),
        ],
        id_column: "id".into(),
        parse_errors: vec![],
    });
    orchestrator.index.add(doc);

    let outcome = orchestrator.ask("age > 35").await;
    assert_eq!(outcome.route, AnswerRoute::LocalData);
    assert!(outcome.answer.contains("age=40"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn remote_summary_failure_falls_back_to_local_summary() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut orchestrator = orchestrator_with(ScriptedBackend {
        ask_calls: calls.clone(),
        answer: Ok("unused".into()),
    });
    orchestrator.index.add(text_doc("report.txt", REPORT_TEXT));

    let summary = orchestrator.summarize().await;
    assert!(summary.contains("DOCUMENT OVERVIEW"));
    assert!(summary.contains("report.txt"));
    assert!(summary.contains("generated locally"));
}

#[tokio::test]
async fn http_backend_surfaces_error_status() {
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    let app = Router::new().route(
        "/api/ai/ask",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "model overloaded" })),
            )
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let backend = HttpAiBackend::new(&format!("http://{}", addr), Duration::from_secs(5));
    let metadata = AskMetadata {
        user_id: "anonymous".into(),
        session_id: "s1".into(),
        document_count: 1,
        original_question: "q".into(),
        is_data_query: false,
        has_table_data: false,
    };
    let err = backend.ask("q", &metadata, false).await.unwrap_err();
    match err {
        RemoteError::Status { status, message } => {
            assert_eq!(status.as_u16(), 500);
            assert!(message.contains("model overloaded"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
}
