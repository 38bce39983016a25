//! Archive storage for uploaded chat files
//!
//! Provides the upload collaborator used by the dispatcher, backed by
//! Cloudflare R2 / AWS S3.

use crate::config::Settings;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use bytes::Bytes;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error putting object into S3
    #[error("S3 put error: {0}")]
    S3Put(String),
    /// Connectivity check against the bucket failed
    #[error("R2 connectivity test failed: {0}")]
    Connection(String),
    /// Configuration error (missing credentials, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Interface for archive backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadProvider: Send + Sync {
    /// Store `content` as `display_name` inside `folder`.
    ///
    /// Returns an opaque storage id for the stored object.
    async fn upload(
        &self,
        content: Bytes,
        display_name: &str,
        folder: &str,
    ) -> Result<String, StorageError>;
    /// Check connection to storage
    async fn check_connection(&self) -> Result<(), StorageError>;
}

/// R2-backed storage implementation
pub struct R2Storage {
    client: Client,
    bucket: String,
}

impl R2Storage {
    /// Create a new R2 storage instance
    ///
    /// # Errors
    ///
    /// Returns an error if R2 configuration is missing.
    pub async fn new(settings: &Settings) -> Result<Self, StorageError> {
        let endpoint_url = settings
            .r2_endpoint_url
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ENDPOINT_URL is missing".into()))?;
        let access_key = settings
            .r2_access_key_id
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ACCESS_KEY_ID is missing".into()))?;
        let secret_key = settings
            .r2_secret_access_key
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_SECRET_ACCESS_KEY is missing".into()))?;
        let bucket = settings
            .r2_bucket_name
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_BUCKET_NAME is missing".into()))?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "r2-storage");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(endpoint_url)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: bucket.clone(),
        })
    }
}

#[async_trait]
impl UploadProvider for R2Storage {
    async fn upload(
        &self,
        content: Bytes,
        display_name: &str,
        folder: &str,
    ) -> Result<String, StorageError> {
        let key = object_key(folder, display_name);
        let size = content.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(content))
            .content_type(content_type_for(display_name))
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;

        info!(key = %key, size, "Archived file to R2");
        Ok(key)
    }

    async fn check_connection(&self) -> Result<(), StorageError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!("Successfully connected to R2 storage.");
                Ok(())
            }
            Err(e) => {
                let err_msg = format!("{e:#?}");
                error!("R2 connectivity test failed: {}", err_msg);
                Err(StorageError::Connection(err_msg))
            }
        }
    }
}

/// Returns the object key for an archived file.
///
/// A random prefix keeps same-named files from overwriting each other.
#[must_use]
pub fn object_key(folder: &str, display_name: &str) -> String {
    let safe_name = display_name.replace(['/', '\\'], "_");
    let id = Uuid::new_v4().as_simple().to_string();
    let folder = folder.trim_end_matches('/');
    if folder.is_empty() {
        format!("{id}-{safe_name}")
    } else {
        format!("{folder}/{id}-{safe_name}")
    }
}

/// MIME type sent with the object, picked from the file extension
#[must_use]
pub fn content_type_for(display_name: &str) -> &'static str {
    let ext = display_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "mp4" => "video/mp4",
        "ogg" | "oga" => "audio/ogg",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
