//! Telegram client configuration.

use std::time::Duration;

use crate::error::{DeliveryError, DeliveryResult};

const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Bot API upload limit for `sendVideo` (50 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Telegram client configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// API root, overridable for a local Bot API server or tests
    pub api_url: String,
    /// Largest file sent as a streaming video
    pub max_file_size: u64,
    /// Timeout for multipart uploads
    pub upload_timeout: Duration,
    /// Timeout for plain JSON calls
    pub request_timeout: Duration,
    /// Retries for rate limits and transient failures
    pub max_retries: u32,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("max_file_size", &self.max_file_size)
            .field("upload_timeout", &self.upload_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            upload_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> DeliveryResult<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| DeliveryError::config_error("TELEGRAM_BOT_TOKEN not set"))?;

        let mut config = Self::new(bot_token);

        if let Ok(url) = std::env::var("TELEGRAM_API_URL") {
            if !url.trim().is_empty() {
                config.api_url = url;
            }
        }

        config.max_file_size = std::env::var("TELEGRAM_MAX_FILE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_FILE_SIZE);

        config.upload_timeout = Duration::from_secs(
            std::env::var("TELEGRAM_UPLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        );

        Ok(config)
    }

    /// Endpoint URL for a Bot API method.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url.trim_end_matches('/'), self.bot_token, method)
    }
}
