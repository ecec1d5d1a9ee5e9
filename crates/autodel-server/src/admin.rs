use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::{routing::get, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::engine::{EngineHandle, EngineStats};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
        }
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler.
pub async fn info_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": "autodel-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Table and store sizes, read from the engine.
pub async fn stats_handler(
    State(engine): State<EngineHandle>,
) -> Result<Json<EngineStats>, (StatusCode, String)> {
    engine
        .stats()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

/// Build the admin router.
pub fn build_router(engine: EngineHandle) -> Router {
    Router::new()
        .route("/v1/health", get(health_handler))
        .route("/v1/info", get(info_handler))
        .route("/v1/stats", get(stats_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}
