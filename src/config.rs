//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the tunables shared by the caches and the dispatcher.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Comma-separated list of user IDs allowed to use the bot
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,

    /// Let every Telegram user in, ignoring `allowed_users`
    #[serde(default)]
    pub allow_all_users: bool,

    /// R2 Storage access key ID
    pub r2_access_key_id: Option<String>,
    /// R2 Storage secret access key
    pub r2_secret_access_key: Option<String>,
    /// R2 Storage endpoint URL
    pub r2_endpoint_url: Option<String>,
    /// R2 Storage bucket name
    pub r2_bucket_name: Option<String>,

    /// Root folder (key prefix) that archived files are written under
    #[serde(default = "default_upload_prefix")]
    pub upload_prefix: String,
}

fn default_upload_prefix() -> String {
    "uploads".to_string()
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if a present config file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__UPLOAD_PREFIX=photos ./target/app` sets `upload_prefix`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Environment::default() maps UPPER_SNAKE_CASE to snake_case;
        // ignore_empty treats empty env vars as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chat_archiver::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let mut settings: Self = build_config()?.try_deserialize()?;

        // Automatic mapping does not always pick up the R2 keys
        for (key, slot) in [
            ("R2_ENDPOINT_URL", &mut settings.r2_endpoint_url),
            ("R2_ACCESS_KEY_ID", &mut settings.r2_access_key_id),
            ("R2_SECRET_ACCESS_KEY", &mut settings.r2_secret_access_key),
            ("R2_BUCKET_NAME", &mut settings.r2_bucket_name),
        ] {
            if slot.is_none() {
                if let Ok(val) = std::env::var(key) {
                    if !val.is_empty() {
                        *slot = Some(val);
                    }
                }
            }
        }

        Ok(settings)
    }

    /// Returns a set of Telegram IDs that are allowed to use the bot
    #[must_use]
    pub fn allowed_users(&self) -> HashSet<i64> {
        self.allowed_users_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// How long a handled message identifier is remembered (24 hours).
pub const PROCESSED_RETENTION_SECS: u64 = 24 * 60 * 60;

/// Number of recent files kept per scope and in the aggregate view.
pub const RECENT_FILES_LIMIT: usize = 5;

/// Largest file the Telegram Bot API lets bots download (20 MB).
pub const MAX_DOWNLOAD_SIZE: u32 = 20 * 1024 * 1024;

/// Scope key used for uploads that do not come from a group chat.
pub const DIRECT_SCOPE: &str = "direct";

/// Cooldown period (seconds) between permission-denied replies to the same user.
/// Default: 20 minutes.
pub const DENIAL_COOLDOWN_SECS: u64 = 1200;
/// Time-to-live (seconds) for denial throttle entries.
/// Default: 2 hours.
pub const DENIAL_CACHE_TTL_SECS: u64 = 7200;
/// Maximum denial throttle capacity (number of entries).
pub const DENIAL_CACHE_MAX_SIZE: u64 = 10_000;

// Telegram API retry configuration
/// Maximum retry attempts for Telegram API calls
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff delay in milliseconds
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff delay in milliseconds
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Get processed-message retention from env or default.
///
/// Environment variable: `PROCESSED_RETENTION_SECS`.
#[must_use]
pub fn get_processed_retention() -> u64 {
    env_or("PROCESSED_RETENTION_SECS", PROCESSED_RETENTION_SECS)
}

/// Get denial cooldown from env or default.
///
/// Environment variable: `DENIAL_COOLDOWN_SECS`.
#[must_use]
pub fn get_denial_cooldown() -> u64 {
    env_or("DENIAL_COOLDOWN_SECS", DENIAL_COOLDOWN_SECS)
}

/// Get denial cache TTL from env or default.
///
/// Environment variable: `DENIAL_CACHE_TTL_SECS`.
#[must_use]
pub fn get_denial_cache_ttl() -> u64 {
    env_or("DENIAL_CACHE_TTL_SECS", DENIAL_CACHE_TTL_SECS)
}

/// Get denial cache max size from env or default.
///
/// Environment variable: `DENIAL_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_denial_cache_max_size() -> u64 {
    env_or("DENIAL_CACHE_MAX_SIZE", DENIAL_CACHE_MAX_SIZE)
}
