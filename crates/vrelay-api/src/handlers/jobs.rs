//! Job submission, status and progress events.

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use vrelay_jobs::{ProgressEvent, ProgressStream};
use vrelay_models::{JobId, JobSnapshot, ProcessRequest};

use crate::error::ApiResult;
use crate::metrics::EventStreamGuard;
use crate::state::AppState;

/// Response for an accepted job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
    pub status_url: String,
}

impl SubmitResponse {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.to_string(),
            status_url: format!("/jobs/{}", job_id),
        }
    }
}

/// Submit a job and hand back its id.
pub(crate) fn accept(state: &AppState, request: ProcessRequest) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let job_id = state.orchestrator.submit(request)?;
    info!(job_id = %job_id, "Accepted job");
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse::new(&job_id))))
}

/// POST /jobs
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let Json(request) = payload?;
    accept(&state, request)
}

/// GET /jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let snapshot = state.orchestrator.get_status(&JobId::from_string(job_id))?;
    Ok(Json(snapshot))
}

/// GET /jobs/:job_id/events
///
/// Sends the current state first, then every later transition, and closes
/// after the terminal one.
pub async fn job_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let (snapshot, updates) = state.orchestrator.watch(&JobId::from_string(job_id))?;

    let current = ProgressEvent::from_job(&snapshot.job);
    let updates: ProgressStream = if current.is_terminal() {
        Box::pin(futures_util::stream::empty())
    } else {
        updates
    };

    let guard = EventStreamGuard::open();
    let stream = futures_util::stream::once(async move { current })
        .chain(updates)
        .map(move |event| {
            let _open = &guard;
            Ok::<_, Infallible>(to_sse(&event))
        });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &ProgressEvent) -> Event {
    match Event::default().event("progress").json_data(event) {
        Ok(sse) => sse,
        Err(e) => {
            warn!(job_id = %event.job_id, "Failed to encode progress event: {}", e);
            Event::default().event("progress").data(event.status.as_str())
        }
    }
}
