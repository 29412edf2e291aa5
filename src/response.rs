//! Response helpers for table routes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

/// A non-empty array answers 204 and still carries the rows; everything else is 200.
pub fn success(result: Value) -> Response {
    let status = match &result {
        Value::Array(rows) if !rows.is_empty() => StatusCode::NO_CONTENT,
        _ => StatusCode::OK,
    };
    (status, Json(result)).into_response()
}

pub fn not_implemented() -> Response {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(serde_json::json!({ "err": "Method Not Implemented" })),
    )
        .into_response()
}
