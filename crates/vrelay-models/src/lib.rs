//! Shared data models for the vrelay pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their status machine and result payloads
//! - Submission requests and webhook alias normalization
//! - Streaming encode policy and thumbnail settings
//! - Storage objects and delivery receipts

pub mod delivery;
pub mod encoding;
pub mod job;
pub mod object;
pub mod request;
pub mod utils;

// Re-export common types
pub use delivery::{DeliveryMode, DeliveryOptions, DeliveryReceipt};
pub use encoding::{QualityPreset, StreamingPolicy, ThumbnailOffset, ThumbnailSize};
pub use job::{Job, JobId, JobResult, JobSnapshot, JobStateError, JobStatus, MediaSummary};
pub use object::{ObjectInfo, SearchQuery};
pub use request::{normalize_webhook, AutoProcessRequest, Control, ProcessRequest};
pub use utils::{format_file_size, safe_filename, single_line};
