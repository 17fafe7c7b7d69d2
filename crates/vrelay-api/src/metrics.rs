//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vrelay_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vrelay_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vrelay_http_requests_in_flight";

    pub const EVENT_STREAMS_ACTIVE: &str = "vrelay_event_streams_active";
    pub const WEBHOOKS_TOTAL: &str = "vrelay_webhooks_total";
    pub const AUTO_PROCESS_JOBS_TOTAL: &str = "vrelay_auto_process_jobs_total";

    pub const RATE_LIMIT_HITS_TOTAL: &str = "vrelay_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a webhook call and whether it produced a job.
pub fn record_webhook(accepted: bool) {
    counter!(
        names::WEBHOOKS_TOTAL,
        "outcome" => if accepted { "accepted" } else { "rejected" }
    )
    .increment(1);
}

/// Count jobs queued by one folder auto-process call.
pub fn record_auto_process(jobs: usize) {
    counter!(names::AUTO_PROCESS_JOBS_TOTAL).increment(jobs as u64);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Keeps the open event-stream gauge raised while alive.
pub struct EventStreamGuard(());

impl EventStreamGuard {
    pub fn open() -> Self {
        gauge!(names::EVENT_STREAMS_ACTIVE).increment(1.0);
        Self(())
    }
}

impl Drop for EventStreamGuard {
    fn drop(&mut self) {
        gauge!(names::EVENT_STREAMS_ACTIVE).decrement(1.0);
    }
}

/// Metrics middleware for HTTP requests.
///
/// Requests are labelled by route template so job ids don't explode the
/// label set.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(&method, &route, response.status().as_u16(), start.elapsed().as_secs_f64());

    response
}
