//! Source storage collaborator.
//!
//! This crate provides:
//! - The [`SourceStore`] trait consumed by the job orchestrator
//! - Source reference parsing (Drive links and ids, `s3://`, plain URLs)
//! - A Google Drive v3 client with service-account or API-key auth
//! - S3-compatible and direct HTTP backends
//! - Streamed downloads into per-job directories
//! - Retry with exponential backoff and jitter

pub mod download;
pub mod drive;
pub mod error;
pub mod http;
pub mod metrics;
pub mod reference;
pub mod retry;
pub mod router;
pub mod s3;
pub mod store;
pub mod token_cache;

pub use download::download_path;
pub use drive::{DriveClient, DriveConfig};
pub use error::{StorageError, StorageResult};
pub use http::HttpSource;
pub use reference::{SourceKind, SourceRef};
pub use retry::RetryConfig;
pub use router::SourceRouter;
pub use s3::{S3Config, S3Source};
pub use store::SourceStore;
