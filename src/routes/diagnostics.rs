use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::{
    auth::require_api_key,
    extract::{ApiJson, ApiPath, ApiQuery},
    LimitQuery,
};
use crate::{
    decision,
    error::{ApiError, ApiResult},
    models::{DiagnosisResult, DiagnosticLog},
    AppState,
};

// ---

/// Multipart field carrying the photo.
const UPLOAD_FIELD: &str = "file";

pub fn router(state: AppState) -> Router<AppState> {
    // ---
    let max_upload = state.max_upload_bytes;
    let protected = Router::new()
        .route(
            "/api/diagnose-photo",
            post(diagnose_photo).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route_layer(middleware::from_fn_with_state(state, require_api_key));

    Router::new()
        .route("/api/diagnostic-logs", get(diagnostic_logs))
        .route("/api/diagnostic-logs/{id}/feedback", patch(update_feedback))
        .merge(protected)
}

#[derive(Debug, Deserialize)]
struct DiagnoseQuery {
    plant_type: Option<String>,
}

/// `POST /api/diagnose-photo` – classify a leaf photo.
///
/// Model and decode failures fail the request. A failed log write does not:
/// it is logged and the diagnosis is still returned.
async fn diagnose_photo(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<DiagnoseQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<DiagnosisResult>> {
    // ---
    let image = read_upload(&mut multipart?).await?;
    info!("POST /api/diagnose-photo - {} bytes", image.len());

    let diagnosis = state.diagnosis.predict(image).await?;
    let result = decision::diagnosis(diagnosis);

    let log = decision::diagnostic_log(params.plant_type, &result);
    if let Err(e) = state.store.insert_diagnostic_log(&log).await {
        error!("diagnostic_logs insert failed: {}", e);
    }

    info!(
        "POST /api/diagnose-photo - {} ({:.2})",
        result.predicted_class, result.confidence
    );
    Ok(Json(result))
}

async fn read_upload(multipart: &mut Multipart) -> ApiResult<Vec<u8>> {
    // ---
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field.bytes().await?;
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::Validation(format!(
        "missing '{UPLOAD_FIELD}' upload field"
    )))
}

/// `GET /api/diagnostic-logs` – recent diagnoses, newest first.
async fn diagnostic_logs(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Vec<DiagnosticLog>>> {
    // ---
    let rows = state.store.recent_diagnostic_logs(params.limit_or(50)).await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct FeedbackBody {
    user_feedback: String,
}

#[derive(Debug, Serialize)]
struct FeedbackResponse {
    message: &'static str,
    log: DiagnosticLog,
}

/// `PATCH /api/diagnostic-logs/{id}/feedback` – attach free-text feedback.
async fn update_feedback(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<FeedbackBody>,
) -> ApiResult<Json<FeedbackResponse>> {
    // ---
    let log = state
        .store
        .set_diagnostic_feedback(id, &body.user_feedback)
        .await?
        .ok_or_else(|| ApiError::NotFound("Log not found".to_string()))?;

    info!("Feedback saved for diagnostic log {}", id);
    Ok(Json(FeedbackResponse {
        message: "Feedback saved",
        log,
    }))
}
