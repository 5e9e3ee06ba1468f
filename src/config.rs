use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Base URL of the AI/history backend, e.g. `http://localhost:5000`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Client-side abort for ask calls made on behalf of restored sessions.
    /// Ordinary asks rely on transport defaults.
    #[serde(default = "default_ask_timeout")]
    pub restored_ask_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_ask_timeout() -> u64 {
    15
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            restored_ask_timeout_secs: default_ask_timeout(),
        }
    }
}

/// Client-side throttle intervals. These gate questions before any network
/// traffic, independent of server-side limiting.
#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    #[serde(default = "default_ask_interval")]
    pub ask_interval_secs: u64,
    #[serde(default = "default_summary_interval")]
    pub summary_interval_secs: u64,
}

fn default_ask_interval() -> u64 {
    6
}
fn default_summary_interval() -> u64 {
    2
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            ask_interval_secs: default_ask_interval(),
            summary_interval_secs: default_summary_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Documents with less text than this are skipped by the chat fallback
    /// search (restored documents get a synthetic re-upload notice instead).
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    /// Sentences shorter than this are never matched by the fallback search.
    #[serde(default = "default_min_sentence_chars")]
    pub min_sentence_chars: usize,
    /// Per-document cap on fallback-search matches.
    #[serde(default = "default_chat_match_cap")]
    pub chat_match_cap: usize,
}

fn default_min_content_chars() -> usize {
    100
}
fn default_min_sentence_chars() -> usize {
    20
}
fn default_chat_match_cap() -> usize {
    8
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_content_chars: default_min_content_chars(),
            min_sentence_chars: default_min_sentence_chars(),
            chat_match_cap: default_chat_match_cap(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// TTL for the (session, query) activity-dedup guard.
    #[serde(default = "default_record_ttl")]
    pub record_ttl_secs: u64,
    /// Minimum gap between backend upload attempts for one session.
    #[serde(default = "default_upload_guard")]
    pub upload_guard_secs: u64,
}

fn default_user_id() -> String {
    "anonymous".to_string()
}
fn default_record_ttl() -> u64 {
    300
}
fn default_upload_guard() -> u64 {
    30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            record_ttl_secs: default_record_ttl(),
            upload_guard_secs: default_upload_guard(),
        }
    }
}

impl Config {
    /// All-defaults config, used when no config file is present.
    pub fn minimal() -> Self {
        Self {
            backend: BackendConfig::default(),
            limits: LimitsConfig::default(),
            search: SearchConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.backend.base_url.trim().is_empty() {
        anyhow::bail!("backend.base_url must not be empty");
    }

    if config.limits.ask_interval_secs == 0 || config.limits.summary_interval_secs == 0 {
        anyhow::bail!("limits.*_interval_secs must be >= 1");
    }

    if config.search.chat_match_cap == 0 {
        anyhow::bail!("search.chat_match_cap must be >= 1");
    }

    if config.search.min_sentence_chars >= config.search.min_content_chars {
        anyhow::bail!("search.min_sentence_chars must be below search.min_content_chars");
    }

    Ok(config)
}
