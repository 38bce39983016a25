//! Idempotency cache for inbound message identifiers
//!
//! Upstream delivery is at-least-once, so the same message can arrive more
//! than once. Identifiers are remembered for a retention window after they
//! were handled successfully.
//!
//! Expiry is sweep-on-write: every [`ProcessedMessages::mark_processed`]
//! drops entries older than the retention window while it holds the write
//! lock. Nothing runs on a timer, so after a quiet period stale entries stay
//! visible to [`ProcessedMessages::is_processed`] until the next write.

use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Message identifiers that were already handled, with their first-seen time
pub struct ProcessedMessages {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
    retention: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl Default for ProcessedMessages {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::PROCESSED_RETENTION_SECS))
    }
}

impl ProcessedMessages {
    /// Create an empty cache using the system clock
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self::with_clock(retention, Arc::new(SystemClock))
    }

    /// Create an empty cache reading time from `clock`
    #[must_use]
    pub fn with_clock(retention: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention: TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    /// Returns `true` if `message_id` was marked and has not been swept yet
    pub async fn is_processed(&self, message_id: &str) -> bool {
        self.entries.read().await.contains_key(message_id)
    }

    /// Record `message_id` as handled and sweep expired entries.
    pub async fn mark_processed(&self, message_id: impl Into<String>) {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        entries.insert(message_id.into(), now);

        let before = entries.len();
        entries.retain(|_, seen| now.signed_duration_since(*seen) <= self.retention);
        let swept = before - entries.len();
        if swept > 0 {
            debug!(swept, remaining = entries.len(), "Swept expired message ids");
        }
    }

    /// Number of remembered identifiers, including not yet swept stale ones
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Configured retention window
    #[must_use]
    pub fn retention(&self) -> TimeDelta {
        self.retention
    }
}
