//! Request and response models for the HTTP/WS surface

use serde::Deserialize;
use serde_json::json;

use order_manager::{OrderRejectReason, SubmissionResult};
use types::{time, MarketTick, Order, OrderType, Side};

use crate::service::GatewayRejectReason;

/// Longest accepted symbol, in bytes.
const SYMBOL_MAX: usize = 15;

/// Order payload as accepted on `POST /api/v1/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRequest {
    pub order_id: u64,
    #[serde(default)]
    pub client_id: u64,
    pub symbol: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub quantity: f64,
    #[serde(default)]
    pub price: Option<f64>,
}

impl OrderRequest {
    /// Validate the payload and build a normalized order stamped with the
    /// current time. Errors are user-facing strings for the 422 body.
    pub fn into_order(self) -> Result<Order, String> {
        if self.symbol.is_empty() || self.symbol.len() > SYMBOL_MAX {
            return Err(format!("symbol must be 1..={SYMBOL_MAX} characters"));
        }

        let side = match self.side.to_ascii_lowercase().as_str() {
            "buy" | "b" => Side::Buy,
            "sell" | "s" => Side::Sell,
            other => return Err(format!("unknown side {other:?}")),
        };

        let order_type = match self.order_type.to_ascii_lowercase().as_str() {
            "limit" => OrderType::Limit,
            "market" => OrderType::Market,
            "stop" => OrderType::Stop,
            other => return Err(format!("unknown order type {other:?}")),
        };

        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err("quantity must be a positive number".to_string());
        }

        let price = match (order_type, self.price) {
            (OrderType::Limit, None) => return Err("price is required for limit orders".to_string()),
            (_, Some(price)) if !price.is_finite() => {
                return Err("price must be a finite number".to_string())
            }
            (_, Some(price)) => price,
            (_, None) => 0.0,
        };

        let mut order = Order {
            order_id: self.order_id,
            client_id: self.client_id,
            timestamp_ns: time::unix_now_ns(),
            price,
            quantity: self.quantity,
            price_ticks: 0,
            quantity_lots: 0,
            symbol: self.symbol,
            side,
            order_type,
        };
        order.normalize_scalars();
        Ok(order)
    }
}

/// Structured outcome of a submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub order_id: u64,
    pub accepted: bool,
    pub resting: bool,
    pub filled_quantity: f64,
    pub remaining_quantity: f64,
    pub reject_reason: OrderRejectReason,
    pub gateway_reject_reason: GatewayRejectReason,
}

impl OrderAck {
    pub fn from_submission(order_id: u64, result: &SubmissionResult) -> Self {
        Self {
            order_id,
            accepted: result.accepted,
            resting: result.resting,
            filled_quantity: result.filled_quantity,
            remaining_quantity: result.remaining_quantity,
            reject_reason: result.reject_reason,
            gateway_reject_reason: GatewayRejectReason::None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "event": "order_ack",
            "order_id": self.order_id,
            "accepted": self.accepted,
            "resting": self.resting,
            "filled_quantity": self.filled_quantity,
            "remaining_quantity": self.remaining_quantity,
            "reject_reason": self.reject_reason.as_str(),
            "gateway_reject_reason": self.gateway_reject_reason.as_str(),
        })
    }
}

/// The tick event as broadcast to WS clients and served from snapshots.
pub fn tick_json(tick: &MarketTick) -> serde_json::Value {
    json!({
        "event": "tick",
        "symbol": tick.symbol,
        "timestamp_ns": tick.timestamp_ns,
        "price": tick.price,
        "quantity": tick.quantity,
        "side": match tick.side {
            Side::Buy => "buy",
            Side::Sell => "sell",
        },
        "source": tick.source,
    })
}
