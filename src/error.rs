//! HTTP boundary error type.
//!
//! Component errors convert into [`ApiError`], and [`IntoResponse`] is the
//! single place where they become status codes.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::inference::InferenceError;
use crate::store::StoreError;

// ---

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or wrong `x-api-key`.
    #[error("Invalid or missing API Key")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    /// Malformed request: unparsable path, query or body syntax.
    #[error("{0}")]
    BadRequest(String),

    /// Request parsed but violates a field constraint.
    #[error("{0}")]
    Validation(String),

    /// Body larger than the route allows.
    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Keep the status an extractor reported, inside the common envelope.
    fn rejected(status: StatusCode, message: String) -> Self {
        // ---
        match status {
            StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(message),
            StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(message),
            _ => ApiError::BadRequest(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::rejected(err.status(), format!("invalid multipart body: {}", err.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let (status, code) = match &self {
            ApiError::Unauthorized => (StatusCode::FORBIDDEN, "UNAUTHORIZED"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ApiError::Inference(InferenceError::Decode(_)) => {
                (StatusCode::BAD_REQUEST, "DECODE_ERROR")
            }
            ApiError::Inference(InferenceError::ModelUnavailable(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "MODEL_UNAVAILABLE")
            }
            ApiError::Inference(InferenceError::UnknownCategory(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UNKNOWN_CATEGORY")
            }
            ApiError::Inference(InferenceError::Inference(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INFERENCE_ERROR")
            }
            ApiError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!("{} {}: {}", status.as_u16(), code, message);
        } else {
            tracing::debug!("{} {}: {}", status.as_u16(), code, message);
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_status_mapping() {
        // ---
        let cases = [
            (ApiError::Unauthorized, StatusCode::FORBIDDEN),
            (ApiError::NotFound("log".into()), StatusCode::NOT_FOUND),
            (ApiError::BadRequest("bad".into()), StatusCode::BAD_REQUEST),
            (ApiError::Validation("bad".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                ApiError::PayloadTooLarge("big".into()),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                InferenceError::ModelUnavailable("gone".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                StoreError::from(sqlx::Error::PoolClosed).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                anyhow::anyhow!("boom").into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_decode_error_is_client_error() {
        // ---
        let decode = image::load_from_memory(b"nope").unwrap_err();
        let resp = ApiError::from(InferenceError::from(decode)).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
