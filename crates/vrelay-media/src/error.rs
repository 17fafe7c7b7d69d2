//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found (set FFMPEG_PATH or install ffmpeg)")]
    FfmpegNotFound,

    #[error("FFprobe not found (set FFPROBE_PATH or install ffprobe)")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Unreadable media: {message}")]
    UnreadableMedia {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    ///
    /// The last stderr line, when present, is folded into the message so
    /// a single-line description still names the cause.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        let mut message = message.into();
        if let Some(last) = stderr
            .as_deref()
            .and_then(|s| s.lines().rev().find(|l| !l.trim().is_empty()))
        {
            message = format!("{} ({})", message, last.trim());
        }
        Self::FfmpegFailed {
            message,
            stderr,
            exit_code,
        }
    }

    /// Create an unreadable-media error.
    pub fn unreadable(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::UnreadableMedia {
            message: message.into(),
            stderr,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True when the input could not be parsed as media.
    pub fn is_unreadable(&self) -> bool {
        matches!(self, MediaError::UnreadableMedia { .. } | MediaError::FileNotFound(_))
    }
}
