//! Common routes: health, readiness, version.

use crate::schema::{SchemaCache, SchemaStatus};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    #[serde(flatten)]
    schema: SchemaStatus,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

/// 200 once every listed table is described; 503 while any is pending or failed.
async fn ready(State(schema): State<Arc<SchemaCache>>) -> (StatusCode, Json<ReadyBody>) {
    let status = schema.status();
    if status.ready {
        (StatusCode::OK, Json(ReadyBody { status: "ok", schema: status }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyBody {
                status: "degraded",
                schema: status,
            }),
        )
    }
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /health, GET /ready (schema discovery state), GET /version.
pub fn common_routes(schema: Arc<SchemaCache>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .with_state(schema)
}
