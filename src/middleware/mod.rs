pub mod auth;
pub mod response;

pub use auth::{jwt_auth_middleware, require_elevated, AuthUser};
pub use response::{ApiResponse, ApiResult, FileDownload};
