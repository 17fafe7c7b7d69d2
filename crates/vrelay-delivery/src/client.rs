//! Telegram Bot API client.
//!
//! - `sendVideo` multipart upload with streaming enabled
//! - `sendDocument` fallback above the upload limit or on 413
//! - Retries honoring `parameters.retry_after`

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use vrelay_models::{DeliveryMode, DeliveryOptions, DeliveryReceipt};

use crate::config::TelegramConfig;
use crate::deliverer::Deliverer;
use crate::error::{DeliveryError, DeliveryResult};
use crate::format::{
    failure_text, fallback_caption, inline_keyboard, truncate_caption, STREAMING_HINT,
};
use crate::metrics::{record_fallback, record_request, record_retry};

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Sent message, the fields we read.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// `getMe` result.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

/// Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    config: TelegramConfig,
}

impl TelegramClient {
    /// Create a new Telegram client.
    pub fn new(config: TelegramConfig) -> DeliveryResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("vrelay-delivery/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> DeliveryResult<Self> {
        Self::new(TelegramConfig::from_env()?)
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    /// Upload a video with inline streaming enabled.
    pub async fn send_video(
        &self,
        chat_id: &str,
        video: &Path,
        caption: Option<&str>,
        options: &DeliveryOptions,
    ) -> DeliveryResult<Message> {
        let url = self.config.method_url("sendVideo");

        self.call("sendVideo", || async {
            let mut form = Form::new()
                .text("chat_id", chat_id.to_string())
                .part("video", file_part(video, "video/mp4").await?)
                .text("supports_streaming", "true");

            form = with_caption(form, caption);
            if let Some(duration) = options.duration {
                form = form.text("duration", duration.to_string());
            }
            if let Some(width) = options.width {
                form = form.text("width", width.to_string());
            }
            if let Some(height) = options.height {
                form = form.text("height", height.to_string());
            }
            form = with_thumbnail(form, options).await?;
            if let Some(keyboard) = inline_keyboard(&options.controls) {
                form = form.text("reply_markup", keyboard.to_string());
            }

            Ok(self.http.post(&url).multipart(form).timeout(self.config.upload_timeout))
        })
        .await
    }

    /// Upload a file as a generic document.
    pub async fn send_document(
        &self,
        chat_id: &str,
        document: &Path,
        caption: Option<&str>,
        options: &DeliveryOptions,
    ) -> DeliveryResult<Message> {
        let url = self.config.method_url("sendDocument");

        self.call("sendDocument", || async {
            let mut form = Form::new()
                .text("chat_id", chat_id.to_string())
                .part("document", file_part(document, "video/mp4").await?);

            form = with_caption(form, caption);
            form = with_thumbnail(form, options).await?;
            if let Some(keyboard) = inline_keyboard(&options.controls) {
                form = form.text("reply_markup", keyboard.to_string());
            }

            Ok(self.http.post(&url).multipart(form).timeout(self.config.upload_timeout))
        })
        .await
    }

    /// Send a text message, optionally as a reply.
    pub async fn send_message(&self, chat_id: &str, text: &str, reply_to: Option<i64>) -> DeliveryResult<Message> {
        let url = self.config.method_url("sendMessage");

        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(message_id) = reply_to {
            body["reply_parameters"] = json!({
                "message_id": message_id,
                "allow_sending_without_reply": true,
            });
        }

        self.call("sendMessage", || async {
            Ok(self.http.post(&url).json(&body).timeout(self.config.request_timeout))
        })
        .await
    }

    /// Fetch the bot identity, verifying the token.
    pub async fn get_me(&self) -> DeliveryResult<BotUser> {
        let url = self.config.method_url("getMe");
        self.call("getMe", || async { Ok(self.http.get(&url).timeout(self.config.request_timeout)) })
            .await
    }

    /// Execute a Bot API call with retry.
    ///
    /// `build` runs once per attempt since multipart bodies are consumed.
    async fn call<T, F, Fut>(&self, method: &'static str, build: F) -> DeliveryResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = DeliveryResult<RequestBuilder>>,
    {
        let mut attempt = 0;

        loop {
            let result = match build().await {
                Ok(request) => execute::<T>(request).await,
                Err(e) => Err(e),
            };
            record_request(method, result.is_ok());

            match result {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = retry_delay(&e, attempt);
                    warn!(
                        method,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Telegram call failed, retrying: {}",
                        e
                    );
                    record_retry(method);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn deliver_document(
        &self,
        media: &Path,
        destination: &str,
        options: &DeliveryOptions,
    ) -> DeliveryResult<DeliveryReceipt> {
        let caption = truncate_caption(&fallback_caption(options.caption.as_deref(), self.config.max_file_size));
        let message = self.send_document(destination, media, Some(&caption), options).await?;

        if let Err(e) = self.send_message(destination, STREAMING_HINT, Some(message.message_id)).await {
            warn!(chat_id = %destination, "Failed to send streaming hint: {}", e);
        }

        info!(chat_id = %destination, message_id = message.message_id, "Video sent as document");
        Ok(receipt(&message, DeliveryMode::Document))
    }
}

async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> DeliveryResult<T> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    match serde_json::from_str::<ApiResponse<T>>(&body) {
        Ok(ApiResponse {
            ok: true,
            result: Some(result),
            ..
        }) => Ok(result),
        Ok(api) => Err(DeliveryError::from_api(
            api.error_code.unwrap_or(status.as_u16()),
            api.description.unwrap_or_else(|| status.to_string()),
            api.parameters.and_then(|p| p.retry_after),
        )),
        Err(e) if status.is_success() => Err(DeliveryError::Json(e)),
        // Proxies answer oversized uploads with a non-JSON 413
        Err(_) => Err(DeliveryError::from_api(
            status.as_u16(),
            status.canonical_reason().unwrap_or("request failed"),
            None,
        )),
    }
}

fn retry_delay(err: &DeliveryError, attempt: u32) -> Duration {
    match err {
        DeliveryError::RateLimited { retry_after, .. } => Duration::from_secs((*retry_after).min(60)),
        _ => Duration::from_millis(500u64.saturating_mul(1 << attempt.min(6))),
    }
}

async fn file_part(path: &Path, mime: &str) -> DeliveryResult<Part> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DeliveryError::FileNotFound(path.to_path_buf())
        } else {
            DeliveryError::Io(e)
        }
    })?;
    let len = file.metadata().await?.len();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string();

    Ok(Part::stream_with_length(Body::from(file), len)
        .file_name(name)
        .mime_str(mime)?)
}

fn with_caption(form: Form, caption: Option<&str>) -> Form {
    match caption.filter(|c| !c.trim().is_empty()) {
        Some(caption) => form.text("caption", caption.to_string()).text("parse_mode", "HTML"),
        None => form,
    }
}

async fn with_thumbnail(form: Form, options: &DeliveryOptions) -> DeliveryResult<Form> {
    match options.thumbnail.as_deref() {
        Some(thumb) if thumb.exists() => Ok(form.part("thumbnail", file_part(thumb, "image/jpeg").await?)),
        Some(thumb) => {
            debug!(path = %thumb.display(), "Thumbnail missing, uploading without it");
            Ok(form)
        }
        None => Ok(form),
    }
}

fn receipt(message: &Message, mode: DeliveryMode) -> DeliveryReceipt {
    DeliveryReceipt {
        message_id: message.message_id.to_string(),
        chat_id: message.chat.id.to_string(),
        mode,
    }
}

#[async_trait]
impl Deliverer for TelegramClient {
    async fn deliver(
        &self,
        media: &Path,
        destination: &str,
        options: &DeliveryOptions,
    ) -> DeliveryResult<DeliveryReceipt> {
        let size = match tokio::fs::metadata(media).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DeliveryError::FileNotFound(media.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        if size > self.config.max_file_size {
            info!(
                chat_id = %destination,
                size,
                limit = self.config.max_file_size,
                "Video exceeds streaming upload limit, sending as document"
            );
            record_fallback("size");
            return self.deliver_document(media, destination, options).await;
        }

        let caption = options.caption.as_deref().map(truncate_caption);
        match self.send_video(destination, media, caption.as_deref(), options).await {
            Ok(message) => {
                info!(chat_id = %destination, message_id = message.message_id, size, "Video sent with streaming");
                Ok(receipt(&message, DeliveryMode::Streaming))
            }
            Err(e) if e.is_payload_too_large() => {
                warn!(chat_id = %destination, "Streaming upload rejected as too large, sending as document: {}", e);
                record_fallback("rejected");
                self.deliver_document(media, destination, options).await
            }
            Err(e) => Err(e),
        }
    }

    async fn notify_failure(&self, destination: &str, message: &str) -> DeliveryResult<()> {
        self.send_message(destination, &failure_text(message), None).await?;
        Ok(())
    }

    async fn health_check(&self) -> DeliveryResult<()> {
        let me = self.get_me().await?;
        debug!(bot_id = me.id, username = ?me.username, "Telegram bot reachable");
        Ok(())
    }
}
