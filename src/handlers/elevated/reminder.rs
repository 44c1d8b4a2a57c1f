use axum::{
    extract::{Path, State},
    Extension,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::scheduler::{SweepJob, SweepReport};

/// POST /api/root/reminders/:tier - run one sweep now for the caller's tenant
///
/// Tiers: `imminent`, `upcoming`, `long-range`, `deadline`, `force-close`.
/// Returns 409 while the same sweep is already running.
pub async fn trigger(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(tier): Path<String>,
) -> ApiResult<SweepReport> {
    let job = SweepJob::parse(&tier).ok_or_else(|| ApiError::not_found(format!("Unknown reminder tier: {}", tier)))?;

    tracing::info!("Manual {} sweep requested by {} in {}", job.as_str(), user.principal.user_id, user.tenant);
    let report = state.schedulers.for_tenant(&user.tenant).trigger(job).await?;
    Ok(ApiResponse::success(report))
}
