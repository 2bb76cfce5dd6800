use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, info};

use super::{
    auth::require_api_key,
    extract::{ApiJson, ApiQuery},
    LimitQuery,
};
use crate::{
    error::{ApiError, ApiResult},
    models::{SensorData, SensorLog, WateringLog},
    AppState,
};

// ---

/// Soil moisture (%) below which the device is told to water right away.
pub const WATER_NOW_THRESHOLD: f64 = 35.0;

pub fn router(state: AppState) -> Router<AppState> {
    // ---
    let protected = Router::new()
        .route("/api/sensors", get(latest_sensors))
        .route_layer(middleware::from_fn_with_state(state, require_api_key));

    Router::new()
        .route("/api/sensor-data", post(receive_sensor_data))
        .route("/history", get(sensor_history))
        .route("/api/history", get(watering_history))
        .merge(protected)
}

#[derive(Debug, Serialize)]
struct SensorDataResponse {
    water_now: bool,
}

/// `POST /api/sensor-data` – store a device reading and answer with the
/// static threshold decision. The watering model is not involved.
async fn receive_sensor_data(
    State(state): State<AppState>,
    ApiJson(data): ApiJson<SensorData>,
) -> ApiResult<Json<SensorDataResponse>> {
    // ---
    data.validate().map_err(ApiError::Validation)?;

    let log = SensorLog::from_reading(&data);
    state.store.insert_sensor_log(&log).await?;

    let water_now = data.soil_moisture < WATER_NOW_THRESHOLD;
    debug!(
        "POST /api/sensor-data - soil_moisture={} water_now={}",
        data.soil_moisture, water_now
    );
    Ok(Json(SensorDataResponse { water_now }))
}

/// `GET /api/sensors` – most recent reading.
async fn latest_sensors(State(state): State<AppState>) -> ApiResult<Json<SensorLog>> {
    // ---
    state
        .store
        .recent_sensor_logs(1)
        .await?
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No sensor data".to_string()))
}

/// `GET /history` – recent sensor readings, newest first.
async fn sensor_history(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Vec<SensorLog>>> {
    // ---
    let limit = params.limit_or(20);
    let rows = state.store.recent_sensor_logs(limit).await?;
    info!("GET /history - returning {} readings", rows.len());
    Ok(Json(rows))
}

/// `GET /api/history` – recent watering decisions, newest first.
async fn watering_history(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Vec<WateringLog>>> {
    // ---
    let limit = params.limit_or(100);
    let rows = state.store.recent_watering_logs(limit).await?;
    info!("GET /api/history - returning {} watering logs", rows.len());
    Ok(Json(rows))
}
