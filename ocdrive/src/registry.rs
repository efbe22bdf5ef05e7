//! Session identifier generation and the registry of sessions this process created.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Metadata kept for each session this process created
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub command: String,
    pub directory: PathBuf,
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    records: HashMap<String, SessionRecord>,
    /// Ids whose tmux session has not been released yet
    active: Vec<String>,
}

/// Tracks ids generated by this process.
///
/// Ids are `<prefix><unix micros>`, forced strictly increasing so two calls
/// within the same microsecond still yield distinct names.
#[derive(Debug)]
pub struct SessionRegistry {
    prefix: String,
    last_stamp: AtomicU64,
    inner: Mutex<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            last_stamp: AtomicU64::new(0),
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generate a fresh session id
    pub fn generate_id(&self) -> String {
        let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or_default();
        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_default();
        let stamp = now.max(previous + 1);
        format!("{}{}", self.prefix, stamp)
    }

    pub fn register(&self, record: SessionRecord) {
        let mut inner = self.lock();
        inner.active.push(record.id.clone());
        inner.records.insert(record.id.clone(), record);
    }

    /// The session's tmux side is gone; keep its metadata
    pub fn mark_inactive(&self, id: &str) {
        self.lock().active.retain(|active| active != id);
    }

    pub fn get(&self, id: &str) -> Option<SessionRecord> {
        self.lock().records.get(id).cloned()
    }

    /// Ids still awaiting cleanup, oldest first
    pub fn active_ids(&self) -> Vec<String> {
        self.lock().active.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
