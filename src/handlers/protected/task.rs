use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::TenderTask;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, FileDownload};
use crate::services::{NewTask, TaskUpdate};

use super::parse_id;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

/// GET /api/tenders/:id/tasks
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(tender_id): Path<String>,
) -> ApiResult<Vec<TenderTask>> {
    let tasks = state
        .tasks
        .list_tasks(&user.tenant, &user.principal, parse_id(&tender_id)?)
        .await?;
    Ok(ApiResponse::success(tasks))
}

/// POST /api/tenders/:id/tasks
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(tender_id): Path<String>,
    Json(input): Json<NewTask>,
) -> ApiResult<TenderTask> {
    let task = state
        .tasks
        .create_task(&user.tenant, &user.principal, parse_id(&tender_id)?, input)
        .await?;
    Ok(ApiResponse::created(task))
}

/// PATCH /api/tasks/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> ApiResult<TenderTask> {
    let task = state
        .tasks
        .update_task(&user.tenant, &user.principal, parse_id(&id)?, update)
        .await?;
    Ok(ApiResponse::success(task))
}

/// DELETE /api/tasks/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.tasks.delete_task(&user.tenant, &user.principal, parse_id(&id)?).await?;
    Ok(ApiResponse::<()>::no_content())
}

/// PUT /api/tasks/:id/file?filename=quote.pdf - raw request body is the file
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<TenderTask> {
    let body = body.map_err(upload_rejection)?;
    let file_name = query.filename.unwrap_or_else(|| "upload.bin".to_string());
    let task = state
        .tasks
        .submit_task_file(&user.tenant, &user.principal, parse_id(&id)?, &file_name, body.to_vec())
        .await?;
    Ok(ApiResponse::success(task))
}

/// GET /api/tasks/:id/file
pub async fn download_file(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<FileDownload, ApiError> {
    let (task, bytes) = state
        .tasks
        .download_task_file(&user.tenant, &user.principal, parse_id(&id)?)
        .await?;
    Ok(FileDownload {
        file_name: stored_file_name(task.file_ref.as_deref().unwrap_or_default()),
        bytes,
    })
}

/// DELETE /api/tasks/:id/file - back to pending
pub async fn clear_file(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<TenderTask> {
    let task = state
        .tasks
        .clear_task_file(&user.tenant, &user.principal, parse_id(&id)?)
        .await?;
    Ok(ApiResponse::success(task))
}

fn upload_rejection(rejection: BytesRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("File exceeds the upload size limit")
    } else {
        ApiError::bad_request(rejection.body_text())
    }
}

/// Stored paths look like `tasks/<task>/<nonce>-<name>`
fn stored_file_name(path: &str) -> String {
    let last = path.rsplit('/').next().unwrap_or(path);
    last.split_once('-').map_or(last, |(_, name)| name).to_string()
}
