//! Delivery error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Errors returned by the messaging platform or the upload itself.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Rate limited, retry after {retry_after}s: {message}")]
    RateLimited { retry_after: u64, message: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Failed to configure delivery client: {0}")]
    ConfigError(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeliveryError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Map a Bot API failure to an error.
    pub fn from_api(status: u16, description: impl Into<String>, retry_after: Option<u64>) -> Self {
        let description = description.into();

        match status {
            413 => Self::PayloadTooLarge(description),
            // Oversized uploads are sometimes answered with a plain 400
            400 if description.to_lowercase().contains("too big") => Self::PayloadTooLarge(description),
            400 | 403 => Self::BadRequest(description),
            // The Bot API answers 404 for an unknown token
            401 | 404 => Self::Unauthenticated(description),
            429 => Self::RateLimited {
                retry_after: retry_after.unwrap_or(1),
                message: description,
            },
            500..=599 => Self::ServerError(status, description),
            _ => Self::BadRequest(format!("HTTP {}: {}", status, description)),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::RateLimited { .. } | DeliveryError::ServerError(..) => true,
            DeliveryError::Network(e) => !e.is_status() && !e.is_builder(),
            _ => false,
        }
    }

    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, DeliveryError::PayloadTooLarge(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_api() {
        assert!(DeliveryError::from_api(413, "Request Entity Too Large", None).is_payload_too_large());
        assert!(DeliveryError::from_api(400, "Bad Request: file is too big", None).is_payload_too_large());
        assert!(matches!(
            DeliveryError::from_api(400, "Bad Request: chat not found", None),
            DeliveryError::BadRequest(_)
        ));
        assert!(matches!(
            DeliveryError::from_api(401, "Unauthorized", None),
            DeliveryError::Unauthenticated(_)
        ));
        assert!(matches!(
            DeliveryError::from_api(404, "Not Found", None),
            DeliveryError::Unauthenticated(_)
        ));

        let err = DeliveryError::from_api(429, "Too Many Requests: retry after 7", Some(7));
        assert!(err.is_retryable());
        assert!(matches!(err, DeliveryError::RateLimited { retry_after: 7, .. }));

        assert!(DeliveryError::from_api(502, "Bad Gateway", None).is_retryable());
        assert!(!DeliveryError::from_api(400, "nope", None).is_retryable());
    }
}
