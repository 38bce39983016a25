#![deny(missing_docs)]
//! Chat archiver library.
//!
//! Archives chat attachments to R2 exactly once per message and keeps
//! per-chat upload statistics for the `/stats` command.

/// Telegram transport and runtime.
pub mod bot;
/// In-memory idempotency and statistics caches.
pub mod cache;
/// Time source abstraction.
pub mod clock;
/// Configuration management.
pub mod config;
/// Transport-neutral event handling.
pub mod ingest;
/// Storage layer (R2/S3).
pub mod storage;
/// Utility functions.
pub mod utils;
