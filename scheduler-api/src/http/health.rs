//! Liveness/readiness probes and the optional Prometheus `/metrics`
//! endpoint (SPEC_FULL §9.6), grounded on the teacher's `http/health.rs`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use super::AppState;

pub fn router() -> Router<AppState> {
    let mut router = Router::new()
        .route("/health", get(liveness))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness));
    router = router.route("/metrics", get(metrics));
    router
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn liveness() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, Json(HealthResponse { status: "ok" })).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse { status: "unhealthy" })).into_response()
        }
    }
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.config.server.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    scheduler_core::metrics::render().into_response()
}
