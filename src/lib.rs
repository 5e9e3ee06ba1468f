//! # DocDesk
//!
//! A session-scoped document workspace: ingest files in multiple formats,
//! search them sentence-by-sentence, run structured queries over tabular
//! data, and ask questions through a remote AI backend with a local
//! fallback when the service is unavailable.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌────────────────┐
//! │  Ingest   │──▶│ Extract  │──▶│ DocumentIndex  │
//! │ PDF/DOCX/ │   │ +Tabular │   │  (in-memory)   │
//! │ TXT/CSV   │   └──────────┘   └───────┬────────┘
//! └───────────┘                          │
//!                     ┌──────────────────┼──────────────┐
//!                     ▼                  ▼              ▼
//!               ┌──────────┐      ┌───────────┐   ┌──────────┐
//!               │  Search  │      │   Query   │   │   Ask    │
//!               │ keyword  │      │  tabular  │   │ remote + │
//!               └──────────┘      └───────────┘   │ fallback │
//!                                                 └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docdesk search "budget" report.pdf notes.txt
//! docdesk query "age > 30" customers.csv
//! docdesk ask "what is the conclusion?" report.pdf
//! docdesk chat report.pdf customers.csv
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Multi-format content extraction |
//! | [`tabular`] | CSV parsing and multi-view encoding |
//! | [`index`] | Session document index and lifecycle |
//! | [`search`] | Keyword and fallback search |
//! | [`query`] | Structured tabular queries |
//! | [`backend`] | Remote AI backend client |
//! | [`history`] | Session-history service client |
//! | [`session`] | Session identity and activity guards |
//! | [`orchestrator`] | Ask routing and rate limits |
//! | [`ingest`] | Batch file ingestion |

pub mod backend;
pub mod config;
pub mod extract;
pub mod history;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod search;
pub mod session;
pub mod tabular;
