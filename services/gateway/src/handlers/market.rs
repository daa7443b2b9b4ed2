use axum::{
    extract::{Path, State},
    Json,
};

/// `GET /api/v1/markets/{symbol}/snapshot`
///
/// Returns the latest cached tick for any spelling of the symbol, or `{}`
/// when the symbol has never been seen.
pub async fn snapshot(
    State(state): State<crate::state::AppState>,
    Path(symbol): Path<String>,
) -> Json<serde_json::Value> {
    Json(state.gateway.latest_tick_json(&symbol))
}
