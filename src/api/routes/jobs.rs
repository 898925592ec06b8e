//! Job handlers.

use super::{AddJobResponse, AddUrlRequest, DeleteJobsRequest, JobIdsRequest, ListJobsQuery};
use crate::api::AppState;
use crate::api::error_response::bad_request;
use crate::error::Error;
use crate::types::{AddOptions, JobId, JobInfo, State as JobState};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /jobs - List jobs in queue order
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<JobInfo>>, Error> {
    let filter = match query.state.as_deref() {
        Some(raw) => Some(raw.parse::<JobState>().map_err(Error::InvalidInput)?),
        None => None,
    };

    Ok(Json(state.downloader.list(filter).await?))
}

/// GET /jobs/:id - Get a single job
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobInfo>, Error> {
    Ok(Json(state.downloader.get(&JobId::new(id)).await?))
}

/// POST /jobs/url - Add a hoster link
pub async fn add_url(
    State(state): State<AppState>,
    Json(request): Json<AddUrlRequest>,
) -> Result<(StatusCode, Json<AddJobResponse>), Error> {
    let id = state
        .downloader
        .add_direct_link(&request.url, request.options)
        .await?;

    Ok((StatusCode::CREATED, Json(AddJobResponse { id })))
}

/// POST /jobs/container - Add a torrent file
///
/// Multipart fields: `file` (required) and `options` (JSON [`AddOptions`]).
pub async fn add_container(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut content: Option<Vec<u8>> = None;
    let mut options_json: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return bad_request("invalid_multipart", e.to_string()),
        };

        match field.name().unwrap_or("") {
            "file" => match field.bytes().await {
                Ok(bytes) => content = Some(bytes.to_vec()),
                Err(e) => {
                    return bad_request("invalid_file", format!("Failed to read file: {e}"));
                }
            },
            "options" => match field.text().await {
                Ok(text) => options_json = Some(text),
                Err(e) => {
                    return bad_request("invalid_options", format!("Failed to read options: {e}"));
                }
            },
            _ => {}
        }
    }

    let Some(bytes) = content else {
        return bad_request("missing_file", "No torrent provided in 'file' field");
    };

    let options: AddOptions = match options_json {
        Some(json) => match serde_json::from_str(&json) {
            Ok(options) => options,
            Err(e) => {
                return bad_request("invalid_options", format!("Invalid options JSON: {e}"));
            }
        },
        None => AddOptions::default(),
    };

    match state.downloader.add_container(&bytes, options).await {
        Ok(id) => (StatusCode::CREATED, Json(AddJobResponse { id })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /jobs/pause - Pause jobs
pub async fn pause_jobs(
    State(state): State<AppState>,
    Json(request): Json<JobIdsRequest>,
) -> Result<StatusCode, Error> {
    state.downloader.pause(&request.ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /jobs/resume - Resume paused jobs
pub async fn resume_jobs(
    State(state): State<AppState>,
    Json(request): Json<JobIdsRequest>,
) -> Result<StatusCode, Error> {
    state.downloader.resume(&request.ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /jobs/delete - Delete jobs
pub async fn delete_jobs(
    State(state): State<AppState>,
    Json(request): Json<DeleteJobsRequest>,
) -> Result<StatusCode, Error> {
    state
        .downloader
        .delete(&request.ids, request.delete_files)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
