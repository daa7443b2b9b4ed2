use axum::{extract::State, http::header, response::IntoResponse, Json};

use crate::metrics::render_openmetrics;
use crate::state::AppState;

/// `GET /api/v1/health`
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.gateway.health_json())
}

/// `GET /metrics`: OpenMetrics text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = render_openmetrics(
        &state.gateway.metrics(),
        state.orders.active_order_count() as u64,
    );
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
}
