//! HTTP request handlers: metrics exposition and health.

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::compression::CompressionLayer;
use tracing::error;

use immich_exporter_core::registry::{CONTENT_TYPE, EncodeError, encode_text};

use crate::access_log::AccessLogLayer;
use crate::state::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .with_state(state)
        .layer(AccessLogLayer)
        .layer(CompressionLayer::new())
}

// ============================================================
// Metrics
// ============================================================

pub(crate) async fn handle_metrics(State(state): State<AppState>) -> Response {
    let snapshot = state.registry.snapshot();
    exposition_response(encode_text(&snapshot))
}

/// 200 with the encoded body, or 500 with an empty body.
fn exposition_response(encoded: Result<String, EncodeError>) -> Response {
    match encoded {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, Body::empty()).into_response()
        }
    }
}

// ============================================================
// Health
// ============================================================

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}
