// handlers/elevated/mod.rs - /api/root/* handlers
//
// Routed behind `jwt_auth_middleware` and `require_elevated`; only admins and
// procurement officers reach them.
pub mod reminder;
