//! Per-scope upload statistics
//!
//! A scope is a group chat id, or [`DIRECT_SCOPE`](crate::config::DIRECT_SCOPE)
//! for everything else. Each scope keeps a counter, the time of its last
//! upload and a short newest-first list of recent files.
//!
//! Locking is two-tier: the outer map lock only guards find-or-create of a
//! scope record, and each record has its own mutex. Writers to different
//! scopes never wait on each other past the map lookup.

use crate::clock::{Clock, SystemClock};
use crate::config::RECENT_FILES_LIMIT;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// A file that was archived, as shown in `/stats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Display name the file was stored under
    pub name: String,
    /// When the upload was recorded
    pub uploaded_at: DateTime<Utc>,
}

/// Point-in-time view of one scope, or of all scopes combined
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Number of recorded uploads
    pub total_uploads: u64,
    /// Most recent upload, `None` until the first one
    pub last_upload: Option<DateTime<Utc>>,
    /// Newest-first, at most `RECENT_FILES_LIMIT` entries
    pub recent_files: Vec<FileRecord>,
}

#[derive(Debug, Default)]
struct ScopeStats {
    total_uploads: u64,
    last_upload: Option<DateTime<Utc>>,
    recent_files: VecDeque<FileRecord>,
}

impl ScopeStats {
    fn record(&mut self, file: FileRecord, capacity: usize) {
        self.total_uploads += 1;
        self.last_upload = Some(file.uploaded_at);
        self.recent_files.push_front(file);
        self.recent_files.truncate(capacity);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_uploads: self.total_uploads,
            last_upload: self.last_upload,
            recent_files: self.recent_files.iter().cloned().collect(),
        }
    }
}

/// Upload statistics keyed by scope
pub struct ScopedStatsStore {
    scopes: RwLock<HashMap<String, Arc<Mutex<ScopeStats>>>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl Default for ScopedStatsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopedStatsStore {
    /// Create an empty store using the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store reading time from `clock`
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            scopes: RwLock::new(HashMap::new()),
            capacity: RECENT_FILES_LIMIT,
            clock,
        }
    }

    /// Record one archived file for `scope`, creating the scope if needed.
    pub async fn record_upload(&self, scope: &str, file_name: impl Into<String>) {
        let stats = self.scope_or_insert(scope).await;
        let mut stats = stats.lock().await;
        // Timestamp under the scope lock keeps the recent list ordered
        let file = FileRecord {
            name: file_name.into(),
            uploaded_at: self.clock.now(),
        };
        stats.record(file, self.capacity);
    }

    /// Snapshot of a single scope; unknown scopes yield the zero snapshot
    /// and are not created.
    pub async fn get_stats(&self, scope: &str) -> StatsSnapshot {
        let stats = self.scopes.read().await.get(scope).cloned();
        match stats {
            Some(stats) => stats.lock().await.snapshot(),
            None => StatsSnapshot::default(),
        }
    }

    /// Totals across every scope known at call time.
    ///
    /// Each scope is read under its own lock, so no scope is ever reported
    /// half-updated. Scopes are not frozen relative to each other.
    pub async fn get_aggregate_stats(&self) -> StatsSnapshot {
        let scopes: Vec<_> = self.scopes.read().await.values().cloned().collect();

        let mut aggregate = StatsSnapshot::default();
        for stats in scopes {
            let snapshot = stats.lock().await.snapshot();
            aggregate.total_uploads += snapshot.total_uploads;
            aggregate.last_upload = aggregate.last_upload.max(snapshot.last_upload);
            aggregate.recent_files.extend(snapshot.recent_files);
        }

        aggregate
            .recent_files
            .sort_by(|a, b| {
                b.uploaded_at
                    .cmp(&a.uploaded_at)
                    .then_with(|| a.name.cmp(&b.name))
            });
        aggregate.recent_files.truncate(self.capacity);
        aggregate
    }

    /// Number of scopes that have recorded at least one upload
    pub async fn scope_count(&self) -> usize {
        self.scopes.read().await.len()
    }

    async fn scope_or_insert(&self, scope: &str) -> Arc<Mutex<ScopeStats>> {
        if let Some(stats) = self.scopes.read().await.get(scope) {
            return stats.clone();
        }

        let mut scopes = self.scopes.write().await;
        scopes
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ScopeStats::default())))
            .clone()
    }
}
