//! Job bookkeeping for the vrelay orchestrator.
//!
//! This crate provides:
//! - [`JobTable`], the single owner of live job records
//! - [`ProgressChannel`] for pushing job transitions to subscribers
//! - [`RetentionPolicy`] and a background sweeper that evicts finished jobs

pub mod error;
pub mod progress;
pub mod retention;
pub mod table;

pub use error::{TableError, TableResult};
pub use progress::{ProgressChannel, ProgressEvent, ProgressStream, Resync};
pub use retention::{spawn_sweeper, RetentionPolicy};
pub use table::JobTable;
