//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while resolving or fetching source media.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("Invalid source reference: {0}")]
    InvalidReference(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_reference(reference: impl Into<String>) -> Self {
        Self::InvalidReference(reference.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Map an HTTP error status and body to an error.
    ///
    /// Google APIs report quota and rate problems as 403 with a reason in the
    /// body, so the body is inspected before falling back to the status.
    pub fn from_http_status(status: u16, body: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        let body = body.into();
        let lower = body.to_lowercase();

        match status {
            401 => Self::Unauthenticated(body),
            403 if lower.contains("ratelimitexceeded") => Self::RateLimited {
                message: body,
                retry_after_ms,
            },
            403 if lower.contains("quotaexceeded") || lower.contains("dailylimitexceeded") => {
                Self::QuotaExceeded(body)
            }
            403 => Self::Unauthenticated(body),
            404 => Self::NotFound(body),
            429 => Self::RateLimited {
                message: body,
                retry_after_ms,
            },
            500..=599 => Self::ServerError(status, body),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::RateLimited { .. } | StorageError::ServerError(..) => true,
            StorageError::Network(e) => !e.is_status(),
            _ => false,
        }
    }

    /// Server-requested delay before the next attempt.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            StorageError::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Parse a `Retry-After` header given in seconds.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
}
