//! Folder auto-processing.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;

use vrelay_delivery::escape_html;
use vrelay_models::AutoProcessRequest;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedVideo {
    pub name: String,
    pub job_id: String,
    pub status_url: String,
}

#[derive(Debug, Serialize)]
pub struct AutoProcessResponse {
    pub jobs: Vec<QueuedVideo>,
}

fn auto_caption(name: &str) -> String {
    format!("📹 {}\n\n#video #auto_processed", escape_html(name))
}

/// POST /workflow/auto-process
///
/// Queues one job per video the folder search returns. An empty folder
/// yields an empty list.
pub async fn auto_process(
    State(state): State<AppState>,
    payload: Result<Json<AutoProcessRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AutoProcessResponse>)> {
    let Json(request) = payload?;
    request.validate().map_err(ApiError::BadRequest)?;

    let videos = state.storage.search(&request.search_query()).await?;

    let mut jobs = Vec::with_capacity(videos.len());
    for video in &videos {
        let job_id = state
            .orchestrator
            .submit(request.request_for(video, auto_caption(&video.name)))?;
        jobs.push(QueuedVideo {
            name: video.name.clone(),
            status_url: format!("/jobs/{}", job_id),
            job_id: job_id.to_string(),
        });
    }

    info!(
        folder_id = request.folder_id.as_deref().unwrap_or("-"),
        destination = %request.chat_id,
        jobs = jobs.len(),
        "Queued folder videos"
    );
    metrics::record_auto_process(jobs.len());

    Ok((StatusCode::ACCEPTED, Json(AutoProcessResponse { jobs })))
}
