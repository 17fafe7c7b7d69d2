//! Storage metrics collection.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total storage requests by backend, operation and outcome.
    pub const REQUESTS_TOTAL: &str = "vrelay_storage_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "vrelay_storage_retries_total";

    /// Request latency in seconds by backend and operation.
    pub const LATENCY_SECONDS: &str = "vrelay_storage_latency_seconds";

    /// Bytes written to local disk by downloads.
    pub const BYTES_DOWNLOADED_TOTAL: &str = "vrelay_storage_bytes_downloaded_total";
}

/// Record metrics for a completed storage request.
pub fn record_request(backend: &'static str, operation: &'static str, success: bool, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "backend" => backend,
        "operation" => operation,
        "status" => if success { "ok" } else { "error" }
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "backend" => backend,
        "operation" => operation
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

pub fn record_bytes_downloaded(backend: &'static str, bytes: u64) {
    counter!(names::BYTES_DOWNLOADED_TOTAL, "backend" => backend).increment(bytes);
}
