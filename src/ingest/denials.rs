//! Permission-denied reply throttling
//!
//! A user who is not allowed to use the bot gets the "no permission" reply
//! at most once per cooldown period, so a chatty group cannot get the bot
//! rate limited by Telegram.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tracks when each denied user was last told so
#[derive(Clone)]
pub struct DenialThrottle {
    /// user_id -> () with the cooldown as TTL
    notified: Cache<i64, ()>,
    /// Denials swallowed because the user was still in cooldown
    silenced_count: Arc<AtomicU64>,
}

impl Default for DenialThrottle {
    fn default() -> Self {
        Self::new(
            crate::config::DENIAL_COOLDOWN_SECS,
            crate::config::DENIAL_CACHE_TTL_SECS,
            crate::config::DENIAL_CACHE_MAX_SIZE,
        )
    }
}

impl DenialThrottle {
    /// Creates a throttle.
    ///
    /// Entries expire after `min(cooldown_secs, ttl_secs)`; `max_capacity`
    /// bounds memory when many distinct users are denied.
    ///
    /// ```
    /// use chat_archiver::ingest::DenialThrottle;
    ///
    /// let throttle = DenialThrottle::new(1200, 7200, 10_000);
    /// assert_eq!(throttle.silenced_count(), 0);
    /// ```
    #[must_use]
    pub fn new(cooldown_secs: u64, ttl_secs: u64, max_capacity: u64) -> Self {
        let notified = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(cooldown_secs.min(ttl_secs)))
            .build();

        Self {
            notified,
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns `true` if the denial reply should be sent to `user_id` now.
    ///
    /// Only every 100th silenced attempt is logged.
    pub async fn should_notify(&self, user_id: i64) -> bool {
        if self.notified.get(&user_id).await.is_none() {
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count.is_multiple_of(100) {
            debug!(
                "Silenced {} permission denials (recent: user {})",
                count, user_id
            );
        }
        false
    }

    /// Start the cooldown after a denial reply was delivered
    pub async fn mark_notified(&self, user_id: i64) {
        self.notified.insert(user_id, ()).await;
    }

    /// Total number of silenced denials
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }
}
