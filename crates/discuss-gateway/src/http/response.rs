//! JSON bodies shared by the webhook endpoints.

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

pub type ApiResponse = (StatusCode, Json<Value>);

/// 202: the webhook was taken in. `data` carries per-message relay outcomes.
pub fn accepted(message: &str, data: Value) -> ApiResponse {
    (
        StatusCode::ACCEPTED,
        Json(json!({"status": "success", "message": message, "data": data})),
    )
}

pub fn error(status: StatusCode, message: &str) -> ApiResponse {
    (
        status,
        Json(json!({"status": "error", "message": message})),
    )
}

/// 422 with field → problems.
pub fn unprocessable(message: &str, errors: impl serde::Serialize) -> ApiResponse {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({"status": "error", "message": message, "data": errors})),
    )
}
