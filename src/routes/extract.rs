//! Drop-in replacements for axum's `Json`, `Path` and `Query` extractors.
//!
//! Their rejections convert into [`ApiError`], so a malformed request gets
//! the same `{"error": {code, message}}` body as every other failure.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

// ---

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
