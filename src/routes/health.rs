// src/routes/health.rs
//! Health check endpoints for the SmartPlant backend.
//!
//! - `/health` is the lightweight liveness probe used by container
//!   orchestrators; it touches nothing.
//! - `/api/health` reports process and model status. It triggers the lazy
//!   load of the diagnosis model, so the first call after startup may take
//!   a moment.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::inference::LoadStatus;
use crate::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// JSON response body for the `/api/health` endpoint.
#[derive(Serialize)]
struct ModelHealthResponse {
    status: &'static str,
    /// Whether the diagnosis model is loaded.
    ml_loaded: bool,
    watering_model: LoadStatus,
    diagnosis_model: LoadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnosis_error: Option<String>,
}

/// Handle `GET /health`.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Handle `GET /api/health`.
async fn model_health(State(state): State<AppState>) -> Json<ModelHealthResponse> {
    // ---
    let ml_loaded = state.diagnosis.ensure_loaded().await;
    Json(ModelHealthResponse {
        status: "ok",
        ml_loaded,
        watering_model: state.watering.status(),
        diagnosis_model: state.diagnosis.status(),
        diagnosis_error: state.diagnosis.last_error(),
    })
}

/// Create a subrouter containing the health routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/health", get(model_health))
}
