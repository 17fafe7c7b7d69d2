//! Source video search.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use vrelay_models::{format_file_size, ObjectInfo, SearchQuery};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub size_formatted: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl From<ObjectInfo> for VideoSummary {
    fn from(info: ObjectInfo) -> Self {
        Self {
            size_formatted: format_file_size(info.size),
            id: info.id,
            name: info.name,
            size: info.size,
            mime_type: info.mime_type,
            modified_time: info.modified_time,
            download_url: info.download_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub videos: Vec<VideoSummary>,
}

/// POST /videos/search
pub async fn search_videos(
    State(state): State<AppState>,
    payload: Result<Json<SearchQuery>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Json(query) = payload?;
    let found = state.storage.search(&query).await?;
    Ok(Json(SearchResponse {
        videos: found.into_iter().map(VideoSummary::from).collect(),
    }))
}
