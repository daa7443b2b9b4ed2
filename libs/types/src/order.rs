//! Order types and scalar normalization

use crate::fixed;
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

/// A client order as it travels through the serving core.
///
/// Carries both the float fields seen at the boundary and the integer
/// tick/lot fields used for all internal accounting. `normalize_scalars`
/// keeps the two representations coherent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: u64,
    pub client_id: u64,
    pub timestamp_ns: u64,
    pub price: f64,
    pub quantity: f64,
    pub price_ticks: i64,
    pub quantity_lots: i64,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
}

impl Order {
    /// Create a normalized limit order.
    pub fn limit(
        order_id: u64,
        client_id: u64,
        symbol: impl Into<String>,
        side: Side,
        price: f64,
        quantity: f64,
        timestamp_ns: u64,
    ) -> Self {
        let mut order = Self {
            order_id,
            client_id,
            timestamp_ns,
            price,
            quantity,
            price_ticks: 0,
            quantity_lots: 0,
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
        };
        order.normalize_scalars();
        order
    }

    /// Create a normalized market order.
    pub fn market(
        order_id: u64,
        client_id: u64,
        symbol: impl Into<String>,
        side: Side,
        quantity: f64,
        timestamp_ns: u64,
    ) -> Self {
        let mut order = Self {
            order_id,
            client_id,
            timestamp_ns,
            price: 0.0,
            quantity,
            price_ticks: 0,
            quantity_lots: 0,
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
        };
        order.normalize_scalars();
        order
    }

    /// Reconcile float and integer scalar fields.
    ///
    /// Idempotent: nonzero integer fields win; zero integer fields are derived
    /// from the floats, then zero floats are back-filled from the integers.
    pub fn normalize_scalars(&mut self) {
        if self.price_ticks == 0 && self.price != 0.0 {
            self.price_ticks = fixed::to_price_ticks(self.price);
        }
        if self.quantity_lots == 0 && self.quantity != 0.0 {
            self.quantity_lots = fixed::to_quantity_lots(self.quantity);
        }

        if self.price == 0.0 && self.price_ticks != 0 {
            self.price = fixed::from_price_ticks(self.price_ticks);
        }
        if self.quantity == 0.0 && self.quantity_lots != 0 {
            self.quantity = fixed::from_quantity_lots(self.quantity_lots);
        }
    }

    /// Gross notional in units (always non-negative).
    pub fn notional_units(&self) -> i64 {
        fixed::to_notional_units(self.price_ticks, self.quantity_lots).saturating_abs()
    }

    /// Notional in units, signed by side: positive for buys, negative for sells.
    pub fn signed_notional_units(&self) -> i64 {
        let gross = self.notional_units();
        match self.side {
            Side::Buy => gross,
            Side::Sell => gross.saturating_neg(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{NOTIONAL_SCALE, PRICE_SCALE, QUANTITY_SCALE};

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_limit_order_normalizes_on_construction() {
        let order = Order::limit(1, 7, "EUR/USD", Side::Buy, 1.25, 2.0, 1_000);
        assert_eq!(order.price_ticks, 1_250_000);
        assert_eq!(order.quantity_lots, 2 * QUANTITY_SCALE);
    }

    #[test]
    fn test_normalize_integer_fields_win() {
        let mut order = Order::limit(1, 0, "EUR/USD", Side::Buy, 1.0, 1.0, 0);
        order.price = 99.0; // stale float must not override the ticks
        order.normalize_scalars();
        assert_eq!(order.price_ticks, PRICE_SCALE);
    }

    #[test]
    fn test_normalize_backfills_floats() {
        let mut order = Order::limit(1, 0, "EUR/USD", Side::Buy, 1.0, 1.0, 0);
        order.price = 0.0;
        order.quantity = 0.0;
        order.normalize_scalars();
        assert_eq!(order.price, 1.0);
        assert_eq!(order.quantity, 1.0);
    }

    #[test]
    fn test_normalize_idempotent() {
        let mut order = Order::limit(1, 0, "EUR/USD", Side::Sell, 100.5, 0.25, 0);
        let snapshot = order.clone();
        order.normalize_scalars();
        order.normalize_scalars();
        assert_eq!(order, snapshot);
    }

    #[test]
    fn test_signed_notional_by_side() {
        let buy = Order::limit(1, 0, "EUR/USD", Side::Buy, 100.0, 1.0, 0);
        let sell = Order::limit(2, 0, "EUR/USD", Side::Sell, 100.0, 1.0, 0);
        assert_eq!(buy.signed_notional_units(), 100 * NOTIONAL_SCALE);
        assert_eq!(sell.signed_notional_units(), -100 * NOTIONAL_SCALE);
    }

    #[test]
    fn test_order_serialization() {
        let order = Order::limit(42, 7, "GBP/USD", Side::Sell, 1.5, 3.0, 99);
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
        assert!(json.contains("\"sell\""));
        assert!(json.contains("\"limit\""));
    }
}
