// handlers/protected/mod.rs - JWT authenticated handlers
//
// Each handler receives the caller's tenant and principal from `AuthUser`,
// which `jwt_auth_middleware` puts in the request extensions.
pub mod rfq;
pub mod task;
pub mod tender;

use uuid::Uuid;

use crate::error::ApiError;

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::field_error("id", format!("Invalid UUID format: {}", raw)))
}
