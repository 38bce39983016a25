//! Hand-written collaborators shared by the integration tests.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chat_archiver::ingest::{ContentSource, FetchError, MediaRef, ReplySender};
use chat_archiver::storage::{StorageError, UploadProvider};
use std::collections::HashSet;
use std::sync::Mutex;

/// Serves a fixed payload for every file id
pub struct StaticContent(pub &'static [u8]);

#[async_trait]
impl ContentSource for StaticContent {
    async fn fetch(&self, _media: &MediaRef) -> Result<Bytes, FetchError> {
        Ok(Bytes::from_static(self.0))
    }
}

/// In-memory upload target; display names listed in `fail_once` fail on
/// their first attempt only
#[derive(Default)]
pub struct RecordingUploads {
    uploaded: Mutex<Vec<(String, String)>>,
    fail_once: Mutex<HashSet<String>>,
}

impl RecordingUploads {
    pub fn failing_once(name: &str) -> Self {
        let uploads = Self::default();
        uploads
            .fail_once
            .lock()
            .expect("lock")
            .insert(name.to_string());
        uploads
    }

    /// `(folder, display_name)` pairs in upload order
    pub fn uploaded(&self) -> Vec<(String, String)> {
        self.uploaded.lock().expect("lock").clone()
    }
}

#[async_trait]
impl UploadProvider for RecordingUploads {
    async fn upload(
        &self,
        _content: Bytes,
        display_name: &str,
        folder: &str,
    ) -> Result<String, StorageError> {
        if self.fail_once.lock().expect("lock").remove(display_name) {
            return Err(StorageError::S3Put("503 Slow Down".into()));
        }
        let mut uploaded = self.uploaded.lock().expect("lock");
        uploaded.push((folder.to_string(), display_name.to_string()));
        Ok(format!("obj-{}", uploaded.len()))
    }

    async fn check_connection(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Collects replies; optionally refuses to send
#[derive(Default)]
pub struct RecordingReplies {
    sent: Mutex<Vec<(i64, String)>>,
    broken: bool,
}

impl RecordingReplies {
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ReplySender for RecordingReplies {
    async fn send_reply(&self, chat_id: i64, text: &str) -> Result<()> {
        if self.broken {
            return Err(anyhow!("chat not found"));
        }
        self.sent
            .lock()
            .expect("lock")
            .push((chat_id, text.to_string()));
        Ok(())
    }
}
