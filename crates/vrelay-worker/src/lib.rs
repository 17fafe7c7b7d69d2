//! Job orchestrator.
//!
//! This crate provides:
//! - [`Orchestrator`] with `submit` / `get_status` over the in-memory job table
//! - The fetch → analyze → transcode → thumbnail → deliver pipeline
//! - Per-step timeouts and a concurrency limit on running pipelines
//! - Delayed removal of per-job working directories

pub mod artifacts;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;

pub use artifacts::JobArtifacts;
pub use cleanup::CleanupScheduler;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLog;
pub use orchestrator::Orchestrator;
pub use pipeline::{Collaborators, JobContext, Pipeline};
