use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use super::{
    auth::require_api_key,
    extract::{ApiJson, ApiQuery},
};
use crate::{
    decision,
    error::{ApiError, ApiResult},
    models::{PredictRequest, WateringResponse},
    AppState,
};

// ---

pub fn router(state: AppState) -> Router<AppState> {
    // ---
    let protected = Router::new()
        .route("/predict", post(predict_watering))
        .route_layer(middleware::from_fn_with_state(state, require_api_key));

    Router::new()
        .route("/api/plant-info", get(plant_info))
        .merge(protected)
}

#[derive(Debug, Deserialize)]
struct PlantInfoQuery {
    plant_type: Option<String>,
}

/// `GET /api/plant-info` – one catalog entry, or the whole catalog when no
/// plant type is given.
async fn plant_info(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PlantInfoQuery>,
) -> ApiResult<Json<Value>> {
    // ---
    let not_found = || ApiError::NotFound("Plant info not found".to_string());

    let body = match params.plant_type.as_deref().map(str::trim) {
        Some(plant_type) if !plant_type.is_empty() => {
            let info = state.catalog.get(plant_type).await?.ok_or_else(not_found)?;
            serde_json::to_value(info).map_err(anyhow::Error::from)?
        }
        _ => {
            let all = state.catalog.all().await?;
            if all.is_empty() {
                return Err(not_found());
            }
            serde_json::to_value(all).map_err(anyhow::Error::from)?
        }
    };
    Ok(Json(body))
}

/// `POST /predict` – watering recommendation, ML or fallback.
async fn predict_watering(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PredictRequest>,
) -> ApiResult<Json<WateringResponse>> {
    // ---
    req.validate().map_err(ApiError::Validation)?;

    let outcome = state.watering.predict(&req).await;
    let prediction = decision::watering(&req, outcome);

    let log = decision::watering_log(&req, &prediction);
    let logged = match state.store.insert_watering_log(&log).await {
        Ok(()) => true,
        Err(e) => {
            error!("watering_logs insert failed: {}", e);
            false
        }
    };

    info!(
        "POST /predict - {} -> {} ml, {} days ({})",
        req.plant_type,
        prediction.water_given_ml,
        prediction.next_watering_days,
        prediction.source.as_str()
    );
    Ok(Json(WateringResponse { prediction, logged }))
}
