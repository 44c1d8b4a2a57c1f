use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::{Tender, TenderStatus};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{NewTender, TenderUpdate};

use super::parse_id;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// GET /api/tenders - tenders visible to the caller
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Tender>> {
    let status = query
        .status
        .as_deref()
        .map(TenderStatus::parse)
        .transpose()
        .map_err(|e| ApiError::field_error("status", e.to_string()))?;

    let tenders = state.tenders.list(&user.tenant, &user.principal, status).await?;
    Ok(ApiResponse::success(tenders))
}

/// POST /api/tenders
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<NewTender>,
) -> ApiResult<Tender> {
    let tender = state.tenders.create(&user.tenant, &user.principal, input).await?;
    Ok(ApiResponse::created(tender))
}

/// GET /api/tenders/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Tender> {
    let tender = state.tenders.get(&user.tenant, &user.principal, parse_id(&id)?).await?;
    Ok(ApiResponse::success(tender))
}

/// PATCH /api/tenders/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(update): Json<TenderUpdate>,
) -> ApiResult<Tender> {
    let tender = state
        .tenders
        .update(&user.tenant, &user.principal, parse_id(&id)?, update)
        .await?;
    Ok(ApiResponse::success(tender))
}

/// POST /api/tenders/:id/resolve - close before the deadline
pub async fn resolve(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Tender> {
    let tender = state.tenders.resolve(&user.tenant, &user.principal, parse_id(&id)?).await?;
    Ok(ApiResponse::success(tender))
}

/// DELETE /api/tenders/:id - removes tasks and stored files too
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.tenders.delete(&user.tenant, &user.principal, parse_id(&id)?).await?;
    Ok(ApiResponse::<()>::no_content())
}
