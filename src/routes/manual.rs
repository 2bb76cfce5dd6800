use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/manual-water", post(trigger_manual_water))
        .route("/api/manual-water-status", get(manual_water_status))
        .route("/api/manual-water-done", post(manual_water_done))
}

/// Ask the device to water on its next poll.
async fn trigger_manual_water(State(state): State<AppState>) -> Json<Value> {
    state.manual_water.request();
    info!("Manual watering requested");
    Json(json!({ "status": "manual_watering_requested" }))
}

async fn manual_water_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "water_now_manual": state.manual_water.is_pending() }))
}

/// Device acknowledgement after it has watered.
async fn manual_water_done(State(state): State<AppState>) -> Json<Value> {
    state.manual_water.acknowledge();
    info!("Manual watering acknowledged by device");
    Json(json!({ "status": "manual_watering_reset" }))
}
