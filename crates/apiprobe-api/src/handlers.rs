//! Axum handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::debug;

use crate::ApiState;

/// Prometheus text format content type.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = state.registry.render();
    debug!(series = state.registry.len(), "metrics scraped");
    (
        StatusCode::OK,
        [("content-type", PROMETHEUS_CONTENT_TYPE)],
        body,
    )
}
