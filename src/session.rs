//! Working-session identity and activity-dedup guards.
//!
//! Each run of the tool operates under one session. The session tracks which
//! (kind, payload) activity pairs were already recorded to history within a
//! TTL window, and rate-limits backend upload attempts.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::SessionConfig;

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub day_key: Option<String>,
    pub user_id: String,
    recorded: HashMap<(String, String), Instant>,
    record_ttl: Duration,
    last_upload_attempt: Option<Instant>,
    upload_guard: Duration,
}

impl Session {
    pub fn new(id: String, day_key: Option<String>, config: &SessionConfig) -> Self {
        Self {
            id,
            day_key,
            user_id: config.user_id.clone(),
            recorded: HashMap::new(),
            record_ttl: Duration::from_secs(config.record_ttl_secs),
            last_upload_attempt: None,
            upload_guard: Duration::from_secs(config.upload_guard_secs),
        }
    }

    /// Session used when the history service is unreachable. Activity is not
    /// recorded remotely but the guards still apply.
    pub fn local(config: &SessionConfig) -> Self {
        Self::new(format!("local-{}", uuid::Uuid::new_v4()), None, config)
    }

    pub fn is_local(&self) -> bool {
        self.id.starts_with("local-")
    }

    /// True when this (kind, payload) pair has not been recorded within the
    /// TTL window. Marks the pair as recorded.
    pub fn should_record(&mut self, kind: &str, payload: &str) -> bool {
        let now = Instant::now();
        self.recorded
            .retain(|_, recorded_at| now.duration_since(*recorded_at) < self.record_ttl);
        let key = (kind.to_string(), payload.to_string());
        if self.recorded.contains_key(&key) {
            return false;
        }
        self.recorded.insert(key, now);
        true
    }

    /// True when enough time has passed since the last backend upload
    /// attempt. Marks an attempt.
    pub fn upload_allowed(&mut self) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_upload_attempt {
            if now.duration_since(last) < self.upload_guard {
                return false;
            }
        }
        self.last_upload_attempt = Some(now);
        true
    }
}
