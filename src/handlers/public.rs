use axum::response::Json;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult};

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Tender Desk",
            "version": version,
            "description": "Tender and task lifecycle API with scheduled reminders",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "tenders": "/api/tenders[/:id[/resolve|/tasks]] (protected)",
                "tasks": "/api/tasks/:id[/file] (protected)",
                "rfqs": "/api/rfqs[/:id[/send|/assignees]] (protected)",
                "root": "/api/root/reminders/:tier (admin or procurement officer)",
            }
        }
    }))
}

pub async fn health() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
    })))
}
