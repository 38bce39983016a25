//! In-memory coordination caches shared by all handlers.

/// Idempotency cache for inbound message ids.
pub mod processed;
/// Per-scope upload statistics.
pub mod stats;

pub use processed::ProcessedMessages;
pub use stats::{FileRecord, ScopedStatsStore, StatsSnapshot};
