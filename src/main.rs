//! # DocDesk CLI (`docdesk`)
//!
//! Command-line interface for the document workspace. Every invocation
//! builds a fresh in-memory session from the files given on the command
//! line, then runs one operation (or an interactive chat) against it.
//!
//! ## Usage
//!
//! ```bash
//! docdesk --config ./config/docdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docdesk extract <files>` | Show extracted text for each file |
//! | `docdesk search <query> <files>` | Sentence-level keyword search |
//! | `docdesk query <question> <files>` | Structured query over CSV data |
//! | `docdesk ask <question> <files>` | Ask the AI backend (local fallback) |
//! | `docdesk summary <files>` | Summarize the loaded documents |
//! | `docdesk chat <files>` | Interactive chat session |
//! | `docdesk clear` | Clear the backend document store |

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use docdesk::backend::{AiBackend, HttpAiBackend};
use docdesk::config::{self, Config};
use docdesk::history::{HistoryStore, HttpHistoryStore};
use docdesk::orchestrator::Orchestrator;
use docdesk::session::Session;
use docdesk::{extract, ingest, query, search};

/// DocDesk — a session-scoped document workspace with AI-assisted Q&A.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; without one, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "docdesk",
    about = "DocDesk — multi-format document search, tabular queries, and AI-assisted Q&A",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docdesk.toml`; missing files fall back to
    /// built-in defaults.
    #[arg(long, global = true, default_value = "./config/docdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Extract and print the text view of each file.
    ///
    /// CSV files additionally report the detected table shape. Formats
    /// without local extraction print their placeholder text.
    Extract {
        /// Files to extract.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Search the given files for a keyword.
    ///
    /// Matches whole sentences (or CSV rows) containing the query and
    /// reports exact word-boundary occurrence counts per document.
    Search {
        /// The search query string.
        query: String,

        /// Files forming the session to search.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run a structured query over tabular files.
    ///
    /// Supports identifier lookups ("Customer Id 25 details"), numeric
    /// comparisons ("age > 30"), and categorical filters ("gender female").
    Query {
        /// The data question.
        question: String,

        /// Files forming the session; at least one should be a CSV.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ask the AI backend a question about the given files.
    ///
    /// Data questions over CSV files are answered locally without a
    /// network call. When the backend is unreachable or rate-limited the
    /// answer falls back to local document search.
    Ask {
        /// The question.
        question: String,

        /// Files forming the session.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Summarize the given files.
    ///
    /// Asks the backend for a summary; when unavailable, produces a
    /// structural summary from the documents themselves.
    Summary {
        /// Files forming the session.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Interactive chat over the given files.
    ///
    /// Reads questions from stdin until EOF or `/quit`. `/summary` prints
    /// a summary, `/clear` drops the loaded documents.
    Chat {
        /// Files forming the session.
        files: Vec<PathBuf>,

        /// Restore a previous session by id instead of starting fresh.
        #[arg(long)]
        restore: Option<String>,
    },

    /// Clear the backend's document store.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Extract is purely local and needs no config-driven services.
    if let Commands::Extract { files } = &cli.command {
        return run_extract(files);
    }

    let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());

    let backend: Arc<dyn AiBackend> = Arc::new(HttpAiBackend::new(
        &cfg.backend.base_url,
        Duration::from_secs(cfg.backend.restored_ask_timeout_secs),
    ));
    let history: Arc<dyn HistoryStore> = Arc::new(HttpHistoryStore::new(&cfg.backend.base_url));

    match cli.command {
        Commands::Extract { .. } => unreachable!(),
        Commands::Search { query, files } => {
            let mut orchestrator =
                new_orchestrator(backend.clone(), history.clone(), cfg, "search").await;
            load_files(&mut orchestrator, &*backend, &*history, &files).await;
            run_search(&orchestrator, &query);
            if !orchestrator.session.is_local()
                && orchestrator.session.should_record("search", &query)
            {
                docdesk::history::try_record_search(
                    history.as_ref(),
                    &orchestrator.session.id,
                    &query,
                )
                .await;
            }
        }
        Commands::Query { question, files } => {
            let mut orchestrator =
                new_orchestrator(backend.clone(), history.clone(), cfg, "query").await;
            load_files(&mut orchestrator, &*backend, &*history, &files).await;
            println!("{}", query::run_query(orchestrator.index.all(), &question));
        }
        Commands::Ask { question, files } => {
            let mut orchestrator =
                new_orchestrator(backend.clone(), history.clone(), cfg, "ask").await;
            load_files(&mut orchestrator, &*backend, &*history, &files).await;
            let outcome = orchestrator.ask(&question).await;
            println!("{}", outcome.answer);
        }
        Commands::Summary { files } => {
            let mut orchestrator =
                new_orchestrator(backend.clone(), history.clone(), cfg, "summary").await;
            load_files(&mut orchestrator, &*backend, &*history, &files).await;
            println!("{}", orchestrator.summarize().await);
        }
        Commands::Chat { files, restore } => {
            let mut orchestrator =
                new_orchestrator(backend.clone(), history.clone(), cfg, "chat").await;
            if let Some(session_id) = restore {
                match orchestrator.restore(&session_id).await {
                    Ok(count) => println!("Restored session {} ({} documents).", session_id, count),
                    Err(e) => eprintln!("Could not restore session {}: {}", session_id, e),
                }
            }
            load_files(&mut orchestrator, &*backend, &*history, &files).await;
            run_chat(&mut orchestrator).await?;
        }
        Commands::Clear => {
            let mut orchestrator = new_orchestrator(backend, history, cfg, "clear").await;
            orchestrator.clear().await;
            println!("Documents cleared.");
        }
    }

    Ok(())
}

fn run_extract(files: &[PathBuf]) -> anyhow::Result<()> {
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = std::fs::read(path)?;
        match extract::extract(&bytes, &name, extract::mime_hint_for(&name)) {
            Ok(result) => {
                println!("=== {} ===", name);
                if let Some(table) = result.table.as_ref() {
                    println!(
                        "[table: {} rows, columns: {}]",
                        table.rows.len(),
                        table.headers.join(", ")
                    );
                }
                println!("{}\n", result.text);
            }
            Err(e) => eprintln!("{}: {}", name, e),
        }
    }
    Ok(())
}

/// Create a session (remote when the history service answers, local
/// otherwise) and wrap it in an orchestrator.
async fn new_orchestrator(
    backend: Arc<dyn AiBackend>,
    history: Arc<dyn HistoryStore>,
    cfg: Config,
    session_type: &str,
) -> Orchestrator {
    let session = match history
        .create_session(&cfg.session.user_id, session_type, "DocDesk session")
        .await
    {
        Ok(info) => Session::new(info.id, info.day_key, &cfg.session),
        Err(e) => {
            tracing::warn!(error = %e, "history service unavailable, using local session");
            Session::local(&cfg.session)
        }
    };
    Orchestrator::new(backend, history, cfg, session)
}

async fn load_files(
    orchestrator: &mut Orchestrator,
    backend: &dyn AiBackend,
    history: &dyn HistoryStore,
    files: &[PathBuf],
) {
    if files.is_empty() {
        return;
    }
    let report = ingest::ingest(
        &mut orchestrator.index,
        &mut orchestrator.session,
        backend,
        history,
        files,
    )
    .await;
    for (name, reason) in &report.rejected {
        eprintln!("skipped {}: {}", name, reason);
    }
    for name in &report.duplicates {
        eprintln!("skipped duplicate {}", name);
    }
}

fn run_search(orchestrator: &Orchestrator, query: &str) {
    let results = search::search(orchestrator.index.all(), query);
    if results.is_empty() {
        println!("No matches for \"{}\".", query);
        return;
    }
    for result in results {
        println!(
            "{} ({} bytes): {} matching sentence(s), {} occurrence(s)",
            result.document_name, result.size_bytes, result.total_matches, result.total_occurrences
        );
        for m in &result.matches {
            println!("  {}. {}", m.sequence_number, m.text);
        }
        println!();
    }
}

async fn run_chat(orchestrator: &mut Orchestrator) -> anyhow::Result<()> {
    for message in orchestrator.messages() {
        println!("[{}] {}", message.speaker.label(), message.content);
    }
    println!("Type a question, /summary, /clear, or /quit.");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "/quit" | "/exit" => break,
            "/summary" => println!("{}", orchestrator.summarize().await),
            "/clear" => {
                orchestrator.clear().await;
                println!("Documents cleared.");
            }
            question => {
                let outcome = orchestrator.ask(question).await;
                println!("{}", outcome.answer);
            }
        }
    }
    Ok(())
}
