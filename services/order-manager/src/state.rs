//! Order lifecycle state

use serde::{Deserialize, Serialize};
use types::{Order, Trade};

/// Why an order submission was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderRejectReason {
    None,
    InvalidOrder,
    DuplicateOrderId,
    RiskRejected,
    InternalError,
}

impl OrderRejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderRejectReason::None => "none",
            OrderRejectReason::InvalidOrder => "invalid_order",
            OrderRejectReason::DuplicateOrderId => "duplicate_order_id",
            OrderRejectReason::RiskRejected => "risk_rejected",
            OrderRejectReason::InternalError => "internal_error",
        }
    }
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Resting,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }
}

/// Full bookkeeping for one order.
///
/// Invariant: `initial_lots == filled_lots + remaining_lots + canceled_lots`
/// at every observable moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    pub order: Order,
    pub initial_lots: i64,
    pub remaining_lots: i64,
    pub filled_lots: i64,
    pub canceled_lots: i64,
    pub status: OrderStatus,
    pub reject_reason: OrderRejectReason,
    pub updated_at_ns: u64,
}

impl OrderState {
    pub fn new(order: Order, now_ns: u64) -> Self {
        let initial_lots = order.quantity_lots;
        Self {
            order,
            initial_lots,
            remaining_lots: initial_lots,
            filled_lots: 0,
            canceled_lots: 0,
            status: OrderStatus::New,
            reject_reason: OrderRejectReason::None,
            updated_at_ns: now_ns,
        }
    }

    pub fn check_lot_invariant(&self) -> bool {
        self.initial_lots == self.filled_lots + self.remaining_lots + self.canceled_lots
    }
}

/// Outcome of a submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    pub accepted: bool,
    pub resting: bool,
    pub filled_quantity: f64,
    pub remaining_quantity: f64,
    pub status: OrderStatus,
    pub reject_reason: OrderRejectReason,
    pub trades: Vec<Trade>,
}

impl SubmissionResult {
    pub(crate) fn pending(remaining_quantity: f64) -> Self {
        Self {
            accepted: false,
            resting: false,
            filled_quantity: 0.0,
            remaining_quantity,
            status: OrderStatus::New,
            reject_reason: OrderRejectReason::None,
            trades: Vec::new(),
        }
    }

    pub(crate) fn rejected(mut self, reason: OrderRejectReason) -> Self {
        self.accepted = false;
        self.status = OrderStatus::Rejected;
        self.reject_reason = reason;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::Side;

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::Resting.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
    }

    #[test]
    fn test_reject_reason_strings() {
        assert_eq!(OrderRejectReason::None.as_str(), "none");
        assert_eq!(OrderRejectReason::InvalidOrder.as_str(), "invalid_order");
        assert_eq!(OrderRejectReason::DuplicateOrderId.as_str(), "duplicate_order_id");
        assert_eq!(OrderRejectReason::RiskRejected.as_str(), "risk_rejected");
        assert_eq!(OrderRejectReason::InternalError.as_str(), "internal_error");
    }

    #[test]
    fn test_new_state_satisfies_invariant() {
        let order = Order::limit(1, 0, "EUR/USD", Side::Buy, 1.0, 2.0, 0);
        let state = OrderState::new(order, 42);
        assert!(state.check_lot_invariant());
        assert_eq!(state.remaining_lots, state.initial_lots);
        assert_eq!(state.status, OrderStatus::New);
    }
}
