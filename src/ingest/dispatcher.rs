//! Event dispatcher
//!
//! Routes inbound events: commands are answered from the statistics store,
//! attachments are downloaded, archived and counted exactly once per message
//! id. A message id is marked processed only after its upload succeeded, so
//! a redelivered message whose first attempt failed is tried again.
//!
//! No cache lock is held while a collaborator is awaited; the caches are
//! read before the download and written after the upload.

use super::access::AccessPolicy;
use super::commands::{
    render_stats, Command, HELP_TEXT, PERMISSION_DENIED_TEXT, UNKNOWN_COMMAND_TEXT, UPLOAD_TEXT,
};
use super::denials::DenialThrottle;
use super::event::{EventSource, InboundEvent, MediaRef, MessageContent};
use crate::cache::{ProcessedMessages, ScopedStatsStore};
use crate::clock::{Clock, SystemClock};
use crate::config::MAX_DOWNLOAD_SIZE;
use crate::storage::{StorageError, UploadProvider};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors raised while downloading message content
#[derive(Error, Debug)]
pub enum FetchError {
    /// The transport refused or failed the download
    #[error("download failed: {0}")]
    Download(String),
}

/// Errors for a single event. None of them leave the message marked.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Content kind the bot does not archive
    #[error("unsupported message type: {0}")]
    Unsupported(&'static str),
    /// Attachment above the download limit
    #[error("file too large: {size} bytes (max {limit})")]
    TooLarge {
        /// Reported size
        size: u32,
        /// Configured limit
        limit: u32,
    },
    /// Content could not be downloaded
    #[error("failed to get content: {0}")]
    Fetch(#[from] FetchError),
    /// Archive backend rejected the upload
    #[error("failed to upload: {0}")]
    Upload(#[from] StorageError),
}

/// What happened to an event that was handled without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Attachment archived and counted
    Uploaded {
        /// Id returned by the upload collaborator
        storage_id: String,
        /// Statistics scope the upload was recorded under
        scope: String,
        /// Name the file was archived as
        display_name: String,
    },
    /// Message id already handled; nothing done
    Duplicate,
    /// Command answered
    Command(Command),
    /// Plain text, nothing to do
    Ignored,
    /// Sender rejected by the access policy
    Denied,
}

/// Downloads the bytes behind a media reference
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch the full content of `media`
    async fn fetch(&self, media: &MediaRef) -> Result<Bytes, FetchError>;
}

/// Sends text replies back to a chat
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Send `text` to `chat_id`
    async fn send_reply(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;
}

/// I/O collaborators of the dispatcher
#[derive(Clone)]
pub struct Collaborators {
    /// Attachment downloader
    pub content: Arc<dyn ContentSource>,
    /// Archive backend
    pub uploader: Arc<dyn UploadProvider>,
    /// Reply channel
    pub replies: Arc<dyn ReplySender>,
}

/// Handles inbound events against the shared caches
pub struct EventDispatcher {
    processed: Arc<ProcessedMessages>,
    stats: Arc<ScopedStatsStore>,
    io: Collaborators,
    access: Arc<dyn AccessPolicy>,
    denials: DenialThrottle,
    upload_prefix: String,
    max_file_size: u32,
    clock: Arc<dyn Clock>,
}

impl EventDispatcher {
    /// Create a dispatcher over explicitly constructed caches
    #[must_use]
    pub fn new(
        processed: Arc<ProcessedMessages>,
        stats: Arc<ScopedStatsStore>,
        io: Collaborators,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            processed,
            stats,
            io,
            access,
            denials: DenialThrottle::default(),
            upload_prefix: "uploads".to_string(),
            max_file_size: MAX_DOWNLOAD_SIZE,
            clock: Arc::new(SystemClock),
        }
    }

    /// Root folder uploads are written under
    #[must_use]
    pub fn with_upload_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.upload_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Largest attachment that will be downloaded
    #[must_use]
    pub const fn with_max_file_size(mut self, bytes: u32) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Throttle used for permission-denied replies
    #[must_use]
    pub fn with_denial_throttle(mut self, denials: DenialThrottle) -> Self {
        self.denials = denials;
        self
    }

    /// Clock used for generated file names
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Handle a batch in delivery order. Failures are logged and do not stop
    /// the rest of the batch.
    pub async fn handle_batch(
        &self,
        events: &[InboundEvent],
    ) -> Vec<Result<DispatchOutcome, DispatchError>> {
        let mut results = Vec::with_capacity(events.len());
        for event in events {
            let result = self.handle_event(event).await;
            match &result {
                Err(DispatchError::Unsupported(kind)) => {
                    debug!(message_id = %event.message_id, "Skipping unsupported message type: {kind}");
                }
                Err(e) => error!(message_id = %event.message_id, "Error handling message: {e}"),
                Ok(_) => {}
            }
            results.push(result);
        }
        results
    }

    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] for unsupported content, oversized
    /// attachments, and failed downloads or uploads. The message id is left
    /// unmarked in every error case.
    pub async fn handle_event(
        &self,
        event: &InboundEvent,
    ) -> Result<DispatchOutcome, DispatchError> {
        let user_id = event.source.user_id();
        if !self.access.is_allowed(user_id) {
            self.deny(event.reply_to, user_id).await;
            return Ok(DispatchOutcome::Denied);
        }

        if let MessageContent::Text(text) = &event.content {
            return Ok(match Command::parse(text) {
                Some(command) => {
                    self.run_command(&command, event).await;
                    DispatchOutcome::Command(command)
                }
                None => DispatchOutcome::Ignored,
            });
        }

        match event.content.media() {
            Some(media) => self.archive(event, media).await,
            None => Err(DispatchError::Unsupported(event.content.kind())),
        }
    }

    async fn archive(
        &self,
        event: &InboundEvent,
        media: &MediaRef,
    ) -> Result<DispatchOutcome, DispatchError> {
        let message_id = &event.message_id;
        if self.processed.is_processed(message_id).await {
            debug!("Skipping already processed message ID: {message_id}");
            return Ok(DispatchOutcome::Duplicate);
        }

        if media.size > self.max_file_size {
            return Err(DispatchError::TooLarge {
                size: media.size,
                limit: self.max_file_size,
            });
        }

        let display_name = event.content.display_name(message_id, self.clock.now());
        let folder = self.destination_folder(&event.source);
        info!(
            message_id = %message_id,
            kind = event.content.kind(),
            "File message received"
        );

        let content = self.io.content.fetch(media).await?;
        debug!(
            "File size: {:.2} MB",
            content.len() as f64 / (1024.0 * 1024.0)
        );
        let storage_id = self
            .io
            .uploader
            .upload(content, &display_name, &folder)
            .await?;

        self.processed.mark_processed(message_id.clone()).await;
        let scope = event.source.scope_key();
        self.stats.record_upload(&scope, display_name.clone()).await;

        info!(
            message_id = %message_id,
            scope = %scope,
            storage_id = %storage_id,
            "File uploaded successfully"
        );
        Ok(DispatchOutcome::Uploaded {
            storage_id,
            scope,
            display_name,
        })
    }

    async fn run_command(&self, command: &Command, event: &InboundEvent) {
        let text = match command {
            Command::Help => HELP_TEXT.to_string(),
            Command::Upload => UPLOAD_TEXT.to_string(),
            Command::Unknown(_) => UNKNOWN_COMMAND_TEXT.to_string(),
            Command::Stats => match event.source.group_id() {
                Some(group_id) => {
                    render_stats(&self.stats.get_stats(&group_id.to_string()).await, true)
                }
                None => render_stats(&self.stats.get_aggregate_stats().await, false),
            },
        };
        self.reply(event.reply_to, &text).await;
    }

    async fn deny(&self, chat_id: i64, user_id: i64) {
        if !self.denials.should_notify(user_id).await {
            return;
        }
        info!("Unauthorized access from user {user_id}. Sending denial message.");
        if self.reply(chat_id, PERMISSION_DENIED_TEXT).await {
            self.denials.mark_notified(user_id).await;
        }
    }

    /// Best-effort reply; failures are logged and reported as `false`
    async fn reply(&self, chat_id: i64, text: &str) -> bool {
        match self.io.replies.send_reply(chat_id, text).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Error sending message to chat {chat_id}: {e}");
                false
            }
        }
    }

    fn destination_folder(&self, source: &EventSource) -> String {
        match source.group_id() {
            Some(group_id) => format!("{}/chat-{group_id}", self.upload_prefix),
            None => self.upload_prefix.clone(),
        }
    }
}
