//! Worker error types.

use std::time::Duration;

use thiserror::Error;
use vrelay_delivery::DeliveryError;
use vrelay_jobs::TableError;
use vrelay_media::MediaError;
use vrelay_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The source could not be found, reached or authenticated against.
    #[error("Failed to fetch source: {0}")]
    ResolutionFailure(#[source] StorageError),

    /// Probe, transcode or thumbnail failure.
    #[error("Encoding failed: {0}")]
    EncodingFailure(#[source] MediaError),

    /// The destination rejected the upload, fallback included.
    #[error("Delivery failed: {0}")]
    DeliveryFailure(#[source] DeliveryError),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Step '{step}' timed out after {after:?}")]
    Timeout { step: &'static str, after: Duration },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn timeout(step: &'static str, after: Duration) -> Self {
        Self::Timeout { step, after }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkerError::NotFound(_))
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::InvalidRequest(_) => "invalid_request",
            WorkerError::ResolutionFailure(_) => "resolution",
            WorkerError::EncodingFailure(_) => "encoding",
            WorkerError::DeliveryFailure(_) => "delivery",
            WorkerError::NotFound(_) => "not_found",
            WorkerError::Timeout { .. } => "timeout",
            WorkerError::Internal(_) => "internal",
        }
    }
}

impl From<StorageError> for WorkerError {
    fn from(e: StorageError) -> Self {
        Self::ResolutionFailure(e)
    }
}

impl From<MediaError> for WorkerError {
    fn from(e: MediaError) -> Self {
        Self::EncodingFailure(e)
    }
}

impl From<DeliveryError> for WorkerError {
    fn from(e: DeliveryError) -> Self {
        Self::DeliveryFailure(e)
    }
}

impl From<TableError> for WorkerError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::NotFound(id) => Self::NotFound(id.to_string()),
            TableError::State(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<std::io::Error> for WorkerError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(format!("IO error: {}", e))
    }
}
