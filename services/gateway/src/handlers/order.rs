use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::error::AppError;
use crate::models::OrderRequest;
use crate::service::{self, GatewayRejectReason};
use crate::state::AppState;

/// `POST /api/v1/orders`
///
/// Bearer-token authorized submission. All order outcomes come back as an
/// `order_ack` body; gateway-level refusals additionally map to 401/429.
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) =
        payload.map_err(|rejection| AppError::UnprocessableEntity(rejection.body_text()))?;
    let order = request
        .into_order()
        .map_err(AppError::UnprocessableEntity)?;

    let token = bearer_token(&headers).unwrap_or_default();
    let ack = service::submit_order(&state.gateway, &state.orders, order, &token);

    let status = match ack.gateway_reject_reason {
        GatewayRejectReason::Unauthorized => StatusCode::UNAUTHORIZED,
        GatewayRejectReason::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        GatewayRejectReason::None => StatusCode::OK,
    };
    Ok((status, Json(ack.to_json())))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("authorization")?.to_str().ok()?;
    raw.strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer secret".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("secret".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic dXNlcg==".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
