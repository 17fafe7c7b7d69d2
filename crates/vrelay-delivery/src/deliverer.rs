//! Delivery collaborator seam.

use std::path::Path;

use async_trait::async_trait;
use vrelay_models::{DeliveryOptions, DeliveryReceipt};

use crate::error::DeliveryResult;

/// A destination media can be delivered to.
#[async_trait]
pub trait Deliverer: Send + Sync {
    /// Upload `media` to `destination`.
    ///
    /// Files above the platform limit go out in a fallback mode instead of
    /// failing; the receipt records which mode was used.
    async fn deliver(&self, media: &Path, destination: &str, options: &DeliveryOptions)
        -> DeliveryResult<DeliveryReceipt>;

    /// Tell the destination a job failed.
    async fn notify_failure(&self, destination: &str, message: &str) -> DeliveryResult<()>;

    /// Verify credentials and connectivity.
    async fn health_check(&self) -> DeliveryResult<()> {
        Ok(())
    }
}
