use axum::Router;
use serde::Deserialize;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::AppState;

mod auth;
mod diagnostics;
mod extract;
mod health;
mod manual;
mod plant;
mod sensor;

// ---

/// Upper bound for any `limit` query parameter.
const MAX_LIMIT: i64 = 1000;

/// `?limit=` parameter shared by the history endpoints.
#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

impl LimitQuery {
    fn limit_or(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(plant::router(state.clone()))
        .merge(sensor::router(state.clone()))
        .merge(diagnostics::router(state.clone()))
        .merge(manual::router())
        .merge(health::router())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
