use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::service::GatewayRejectReason;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// `GET /ws?token=…`
///
/// Token-authorized upgrade; the server then pushes one tick JSON message per
/// decoded market event. WS connections do not count as order requests.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let token = query
        .token
        .ok_or_else(|| AppError::BadRequest("missing token query parameter".to_string()))?;

    state
        .gateway
        .authorize_request(&token, false)
        .map_err(|reason| match reason {
            GatewayRejectReason::RateLimited => {
                AppError::RateLimited("websocket connection budget exhausted".to_string())
            }
            _ => AppError::Unauthorized("invalid or expired token".to_string()),
        })?;

    let ticks = state.gateway.subscribe_ticks();
    Ok(ws.on_upgrade(move |socket| stream_ticks(socket, ticks)))
}

async fn stream_ticks(mut socket: WebSocket, mut ticks: broadcast::Receiver<String>) {
    loop {
        tokio::select! {
            tick = ticks.recv() => match tick {
                Ok(json) => {
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging behind tick stream");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    debug!("websocket client disconnected");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
}
