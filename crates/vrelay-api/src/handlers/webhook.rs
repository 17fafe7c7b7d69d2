//! Webhook entry point for workflow tools and bots.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use tracing::debug;

use vrelay_models::normalize_webhook;

use crate::error::ApiResult;
use crate::handlers::jobs::{accept, SubmitResponse};
use crate::metrics;
use crate::state::AppState;

/// POST /webhook/process
///
/// Field aliases are resolved here; the orchestrator only sees the
/// canonical request.
pub async fn process_webhook(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let Json(payload) = payload?;
    let request = normalize_webhook(&payload);
    debug!(
        source_ref = %request.source_ref,
        destination = %request.destination,
        controls = request.controls.len(),
        "Normalized webhook payload"
    );

    let outcome = accept(&state, request);
    metrics::record_webhook(outcome.is_ok());
    outcome
}
