//! Delivery metrics.

use metrics::counter;

pub mod names {
    /// Bot API calls by method and outcome.
    pub const REQUESTS_TOTAL: &str = "vrelay_delivery_requests_total";

    /// Uploads that went out as documents instead of streaming video.
    pub const FALLBACKS_TOTAL: &str = "vrelay_delivery_fallbacks_total";

    pub const RETRIES_TOTAL: &str = "vrelay_delivery_retries_total";
}

pub fn record_request(method: &'static str, success: bool) {
    counter!(
        names::REQUESTS_TOTAL,
        "method" => method,
        "status" => if success { "ok" } else { "error" }
    )
    .increment(1);
}

pub fn record_fallback(reason: &'static str) {
    counter!(names::FALLBACKS_TOTAL, "reason" => reason).increment(1);
}

pub fn record_retry(method: &'static str) {
    counter!(names::RETRIES_TOTAL, "method" => method).increment(1);
}
