use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Rfq, RfqStatus};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{NewRfq, RfqUpdate, RfqView};

use super::parse_id;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssigneesBody {
    pub user_ids: Vec<Uuid>,
}

/// GET /api/rfqs
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Rfq>> {
    let status = query
        .status
        .as_deref()
        .map(RfqStatus::parse)
        .transpose()
        .map_err(|e| ApiError::field_error("status", e.to_string()))?;

    let rfqs = state.rfqs.list(&user.tenant, &user.principal, status).await?;
    Ok(ApiResponse::success(rfqs))
}

/// POST /api/rfqs
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<NewRfq>,
) -> ApiResult<RfqView> {
    let view = state.rfqs.create(&user.tenant, &user.principal, input).await?;
    Ok(ApiResponse::created(view))
}

/// GET /api/rfqs/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<RfqView> {
    let view = state.rfqs.get(&user.tenant, &user.principal, parse_id(&id)?).await?;
    Ok(ApiResponse::success(view))
}

/// PATCH /api/rfqs/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(update): Json<RfqUpdate>,
) -> ApiResult<RfqView> {
    let view = state.rfqs.update(&user.tenant, &user.principal, parse_id(&id)?, update).await?;
    Ok(ApiResponse::success(view))
}

/// POST /api/rfqs/:id/send
pub async fn send(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Rfq> {
    let rfq = state.rfqs.mark_sent(&user.tenant, &user.principal, parse_id(&id)?).await?;
    Ok(ApiResponse::success(rfq))
}

/// PUT /api/rfqs/:id/assignees - replace the assignment list
pub async fn set_assignees(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<AssigneesBody>,
) -> ApiResult<RfqView> {
    let view = state
        .rfqs
        .set_assignees(&user.tenant, &user.principal, parse_id(&id)?, &body.user_ids)
        .await?;
    Ok(ApiResponse::success(view))
}

/// DELETE /api/rfqs/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.rfqs.delete(&user.tenant, &user.principal, parse_id(&id)?).await?;
    Ok(ApiResponse::<()>::no_content())
}
