//! Order manager
//!
//! Orchestrates the lifecycle: normalize, validate, duplicate-check against
//! both live and historical ids, reserve risk, match against the book, then
//! finalize taker and maker state. One mutex owns the book and both state
//! maps, so all lifecycle operations on one instance are linearizable and the
//! book never sees concurrent mutation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use matching_engine::{OrderBook, PartialCancel};
use risk_engine::RiskManager;
use types::{fixed, time, Order, OrderType, Trade};

use crate::state::{OrderRejectReason, OrderState, OrderStatus, SubmissionResult};

struct ManagerInner {
    book: OrderBook,
    active_orders: HashMap<u64, OrderState>,
    /// Terminal (and only terminal) states. Unbounded by design: ids are
    /// consumed for the life of the process, so duplicate checks need every
    /// id ever seen.
    order_history: HashMap<u64, OrderState>,
}

/// Lifecycle state machine over one order book.
pub struct OrderManager {
    risk: Arc<RiskManager>,
    inner: Mutex<ManagerInner>,
}

impl OrderManager {
    pub fn new(risk: Arc<RiskManager>, book: OrderBook) -> Self {
        Self {
            risk,
            inner: Mutex::new(ManagerInner {
                book,
                active_orders: HashMap::new(),
                order_history: HashMap::new(),
            }),
        }
    }

    /// Entry point for new orders from the API or a strategy.
    pub fn submit_order(&self, order: Order) -> SubmissionResult {
        let mut normalized = order;
        normalized.normalize_scalars();

        let result = SubmissionResult::pending(normalized.quantity);

        if !is_valid_order(&normalized) {
            debug!(order_id = normalized.order_id, "submission rejected: invalid order");
            let result = result.rejected(OrderRejectReason::InvalidOrder);
            if normalized.order_id != 0 {
                let mut inner = self.inner.lock().expect("manager mutex poisoned");
                record_rejection(&mut inner, &normalized, OrderRejectReason::InvalidOrder);
            }
            return result;
        }

        let mut inner = self.inner.lock().expect("manager mutex poisoned");

        if inner.active_orders.contains_key(&normalized.order_id)
            || inner.order_history.contains_key(&normalized.order_id)
        {
            debug!(order_id = normalized.order_id, "submission rejected: duplicate id");
            return result.rejected(OrderRejectReason::DuplicateOrderId);
        }

        if !self.risk.check_order(&normalized) {
            info!(order_id = normalized.order_id, "submission rejected by risk");
            record_rejection(&mut inner, &normalized, OrderRejectReason::RiskRejected);
            return result.rejected(OrderRejectReason::RiskRejected);
        }

        let mut result = result;
        let mut taker_state = OrderState::new(normalized.clone(), time::unix_now_ns());

        result.trades = inner.book.match_order(&normalized);
        for trade in &result.trades {
            let taker_fill = fill_leg(&normalized, trade);
            self.risk.on_fill(&taker_fill);
            result.filled_quantity += trade.quantity();
            taker_state.filled_lots += trade.quantity_lots;
            taker_state.remaining_lots =
                (taker_state.remaining_lots - trade.quantity_lots).max(0);
            self.apply_trade_to_maker(&mut inner, trade);
        }

        result.remaining_quantity = fixed::from_quantity_lots(taker_state.remaining_lots);
        result.resting =
            normalized.order_type == OrderType::Limit && taker_state.remaining_lots > 0;

        if result.resting {
            // match_order already rested the residual in the book; mirror it
            // in the taker's state.
            let mut residual = normalized.clone();
            residual.quantity_lots = taker_state.remaining_lots;
            residual.quantity = result.remaining_quantity;
            taker_state.order = residual;
            taker_state.status = if taker_state.filled_lots > 0 {
                OrderStatus::PartiallyFilled
            } else {
                OrderStatus::Resting
            };
            taker_state.updated_at_ns = time::unix_now_ns();
            debug!(
                order_id = normalized.order_id,
                remaining = result.remaining_quantity,
                "order resting"
            );
            inner
                .active_orders
                .insert(normalized.order_id, taker_state.clone());
        } else {
            if taker_state.remaining_lots > 0 {
                // A market (or stop) residual never rests: release the
                // reservation for the unfilled portion.
                let mut released = normalized.clone();
                released.quantity_lots = taker_state.remaining_lots;
                released.quantity = result.remaining_quantity;
                self.risk.on_cancel(&released);
                taker_state.canceled_lots = taker_state.remaining_lots;
                taker_state.remaining_lots = 0;
            }
            taker_state.status = if taker_state.filled_lots > 0 {
                OrderStatus::Filled
            } else {
                OrderStatus::Canceled
            };
            taker_state.order.quantity_lots = 0;
            taker_state.order.quantity = 0.0;
            taker_state.updated_at_ns = time::unix_now_ns();
            inner
                .order_history
                .insert(normalized.order_id, taker_state.clone());
        }

        result.accepted = true;
        result.status = taker_state.status;
        result
    }

    /// Cancel a resting order, releasing its remaining reservation.
    pub fn cancel_order(&self, order_id: u64) -> bool {
        let mut inner = self.inner.lock().expect("manager mutex poisoned");
        if !inner.active_orders.contains_key(&order_id) {
            return false;
        }
        if inner.book.cancel_order(order_id).is_none() {
            warn!(order_id, "active order missing from book on cancel");
            return false;
        }

        let mut state = inner
            .active_orders
            .remove(&order_id)
            .expect("presence checked above");
        self.risk.on_cancel(&state.order);
        state.canceled_lots += state.remaining_lots;
        state.remaining_lots = 0;
        state.order.quantity_lots = 0;
        state.order.quantity = 0.0;
        state.status = OrderStatus::Canceled;
        state.updated_at_ns = time::unix_now_ns();
        inner.order_history.insert(order_id, state);
        info!(order_id, "order canceled");
        true
    }

    /// Reduce a resting order by `quantity`. Reducing by at least the full
    /// remaining size cancels outright; anything less shrinks the order in
    /// place, preserving its time priority.
    pub fn cancel_order_partial(&self, order_id: u64, quantity: f64) -> bool {
        let reduce_lots = fixed::to_quantity_lots(quantity);
        if reduce_lots <= 0 {
            return false;
        }

        let mut inner = self.inner.lock().expect("manager mutex poisoned");
        if !inner.active_orders.contains_key(&order_id) {
            return false;
        }

        match inner.book.cancel_order_partial(order_id, reduce_lots) {
            None => false,
            Some(PartialCancel::Canceled(_)) => {
                let mut state = inner
                    .active_orders
                    .remove(&order_id)
                    .expect("presence checked above");
                self.risk.on_cancel(&state.order);
                state.canceled_lots += state.remaining_lots;
                state.remaining_lots = 0;
                state.order.quantity_lots = 0;
                state.order.quantity = 0.0;
                state.status = OrderStatus::Canceled;
                state.updated_at_ns = time::unix_now_ns();
                inner.order_history.insert(order_id, state);
                true
            }
            Some(PartialCancel::Reduced(updated)) => {
                let state = inner
                    .active_orders
                    .get_mut(&order_id)
                    .expect("presence checked above");
                let released = (state.remaining_lots - updated.quantity_lots).max(0);
                state.order = updated;
                state.remaining_lots = state.order.quantity_lots;
                state.canceled_lots += released;
                state.status = if state.filled_lots > 0 {
                    OrderStatus::PartiallyFilled
                } else {
                    OrderStatus::Resting
                };
                state.updated_at_ns = time::unix_now_ns();

                if released > 0 {
                    let mut freed = state.order.clone();
                    freed.quantity_lots = released;
                    freed.quantity = fixed::from_quantity_lots(released);
                    self.risk.on_cancel(&freed);
                }
                true
            }
        }
    }

    /// Replace a resting order's price and quantity under its original id.
    ///
    /// The replacement's reservation is taken before the original's is
    /// released, so a failure at any step leaves the prior reservation (and
    /// the prior order) fully intact. A successful modify re-baselines the
    /// order's accounting and forfeits time priority.
    pub fn modify_order(&self, order_id: u64, new_price: f64, new_quantity: f64) -> bool {
        let mut inner = self.inner.lock().expect("manager mutex poisoned");
        let Some(state) = inner.active_orders.get(&order_id) else {
            return false;
        };

        let original = state.order.clone();
        let mut replacement = original.clone();
        replacement.price = new_price;
        replacement.quantity = new_quantity;
        replacement.price_ticks = fixed::to_price_ticks(new_price);
        replacement.quantity_lots = fixed::to_quantity_lots(new_quantity);

        if !is_valid_order(&replacement) {
            return false;
        }
        if !self.risk.check_order(&replacement) {
            info!(order_id, "modify rejected by risk");
            return false;
        }
        if let Err(err) = inner.book.modify_order(order_id, replacement.clone()) {
            warn!(order_id, %err, "modify failed in book");
            self.risk.on_cancel(&replacement);
            return false;
        }
        self.risk.on_cancel(&original);

        let state = inner
            .active_orders
            .get_mut(&order_id)
            .expect("presence checked above");
        state.order = replacement;
        state.initial_lots = state.order.quantity_lots;
        state.remaining_lots = state.order.quantity_lots;
        state.filled_lots = 0;
        state.canceled_lots = 0;
        state.status = OrderStatus::Resting;
        state.updated_at_ns = time::unix_now_ns();
        info!(order_id, new_price, new_quantity, "order modified");
        true
    }

    /// Current state of an order, live orders first, then history.
    pub fn get_order_state(&self, order_id: u64) -> Option<OrderState> {
        let inner = self.inner.lock().expect("manager mutex poisoned");
        inner
            .active_orders
            .get(&order_id)
            .or_else(|| inner.order_history.get(&order_id))
            .cloned()
    }

    pub fn active_order_count(&self) -> usize {
        let inner = self.inner.lock().expect("manager mutex poisoned");
        inner.active_orders.len()
    }

    /// Best bid in nominal price units.
    pub fn best_bid(&self) -> Option<f64> {
        let inner = self.inner.lock().expect("manager mutex poisoned");
        inner.book.best_bid().map(fixed::from_price_ticks)
    }

    /// Best ask in nominal price units.
    pub fn best_ask(&self) -> Option<f64> {
        let inner = self.inner.lock().expect("manager mutex poisoned");
        inner.book.best_ask().map(fixed::from_price_ticks)
    }

    pub fn spread(&self) -> Option<f64> {
        let inner = self.inner.lock().expect("manager mutex poisoned");
        inner.book.spread().map(fixed::from_price_ticks)
    }

    /// Volume-weighted average price for consuming `quantity` on `side`.
    pub fn vwap(&self, side: types::Side, quantity: f64) -> Option<f64> {
        let inner = self.inner.lock().expect("manager mutex poisoned");
        inner
            .book
            .vwap(side, fixed::to_quantity_lots(quantity))
            .map(fixed::from_price_ticks)
    }

    fn apply_trade_to_maker(&self, inner: &mut ManagerInner, trade: &Trade) {
        let Some(maker) = inner.active_orders.get_mut(&trade.maker_order_id) else {
            warn!(
                maker_order_id = trade.maker_order_id,
                trade_id = trade.trade_id,
                "trade references unknown maker"
            );
            return;
        };

        let maker_fill = fill_leg(&maker.order, trade);
        self.risk.on_fill(&maker_fill);

        maker.filled_lots += trade.quantity_lots;
        maker.remaining_lots = (maker.remaining_lots - trade.quantity_lots).max(0);
        maker.order.quantity_lots = maker.remaining_lots;
        maker.order.quantity = fixed::from_quantity_lots(maker.remaining_lots);
        maker.status = if maker.remaining_lots == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        maker.updated_at_ns = time::unix_now_ns();

        if maker.remaining_lots == 0 {
            let state = inner
                .active_orders
                .remove(&trade.maker_order_id)
                .expect("entry fetched above");
            inner.order_history.insert(trade.maker_order_id, state);
        }
    }
}

/// Price one leg of a trade for risk accounting: the given order's identity
/// and side, at the trade's price and quantity.
fn fill_leg(order: &Order, trade: &Trade) -> Order {
    let mut leg = order.clone();
    leg.price_ticks = trade.price_ticks;
    leg.quantity_lots = trade.quantity_lots;
    leg.price = trade.price();
    leg.quantity = trade.quantity();
    leg
}

fn record_rejection(inner: &mut ManagerInner, order: &Order, reason: OrderRejectReason) {
    // First rejection wins; a duplicate of a rejected id must not overwrite
    // the original record.
    if inner.active_orders.contains_key(&order.order_id)
        || inner.order_history.contains_key(&order.order_id)
    {
        return;
    }
    let mut state = OrderState::new(order.clone(), time::unix_now_ns());
    state.status = OrderStatus::Rejected;
    state.reject_reason = reason;
    state.canceled_lots = state.remaining_lots;
    state.remaining_lots = 0;
    inner.order_history.insert(order.order_id, state);
}

fn is_valid_order(order: &Order) -> bool {
    if order.order_id == 0 {
        return false;
    }
    if order.quantity_lots <= 0 {
        return false;
    }
    if order.order_type == OrderType::Limit && order.price_ticks <= 0 {
        return false;
    }
    if order.order_type != OrderType::Limit && order.price_ticks < 0 {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use risk_engine::RiskLimits;
    use types::Side;

    fn manager() -> (Arc<RiskManager>, OrderManager) {
        let risk = Arc::new(RiskManager::new(RiskLimits::default()));
        let book = OrderBook::new("EUR/USD");
        let manager = OrderManager::new(risk.clone(), book);
        (risk, manager)
    }

    #[test]
    fn test_invalid_order_rejected() {
        let (_, manager) = manager();
        let order = Order::limit(0, 0, "EUR/USD", Side::Buy, 1.0, 1.0, 0);
        let result = manager.submit_order(order);
        assert!(!result.accepted);
        assert_eq!(result.reject_reason, OrderRejectReason::InvalidOrder);
        assert_eq!(result.status, OrderStatus::Rejected);
    }

    #[test]
    fn test_limit_rests_when_uncrossed() {
        let (risk, manager) = manager();
        let result = manager.submit_order(Order::limit(1, 0, "EUR/USD", Side::Buy, 1.10, 2.0, 0));

        assert!(result.accepted);
        assert!(result.resting);
        assert_eq!(result.status, OrderStatus::Resting);
        assert_eq!(result.remaining_quantity, 2.0);
        assert_eq!(manager.active_order_count(), 1);
        assert_eq!(risk.committed_exposure(), 2.2);
    }

    #[test]
    fn test_market_with_no_liquidity_cancels() {
        let (risk, manager) = manager();
        let result = manager.submit_order(Order::market(1, 0, "EUR/USD", Side::Buy, 1.0, 0));

        assert!(result.accepted);
        assert!(!result.resting);
        assert_eq!(result.status, OrderStatus::Canceled);
        assert_eq!(result.filled_quantity, 0.0);
        assert_eq!(manager.active_order_count(), 0);
        assert_eq!(risk.committed_exposure_units(), 0);

        let state = manager.get_order_state(1).unwrap();
        assert_eq!(state.status, OrderStatus::Canceled);
        assert!(state.check_lot_invariant());
    }

    #[test]
    fn test_risk_rejection_consumes_id() {
        let risk = Arc::new(RiskManager::new(RiskLimits {
            max_order_value: 10.0,
            max_position_exposure: 100.0,
            max_daily_loss: 100.0,
        }));
        let manager = OrderManager::new(risk, OrderBook::new("EUR/USD"));

        let big = Order::limit(7, 0, "EUR/USD", Side::Buy, 100.0, 1.0, 0);
        let result = manager.submit_order(big);
        assert_eq!(result.reject_reason, OrderRejectReason::RiskRejected);

        // The id stays consumed even though the order never traded.
        let small = Order::limit(7, 0, "EUR/USD", Side::Buy, 1.0, 1.0, 0);
        let result = manager.submit_order(small);
        assert_eq!(result.reject_reason, OrderRejectReason::DuplicateOrderId);
    }

    #[test]
    fn test_get_order_state_prefers_active() {
        let (_, manager) = manager();
        manager.submit_order(Order::limit(1, 0, "EUR/USD", Side::Buy, 1.0, 1.0, 0));
        let state = manager.get_order_state(1).unwrap();
        assert_eq!(state.status, OrderStatus::Resting);

        manager.cancel_order(1);
        let state = manager.get_order_state(1).unwrap();
        assert_eq!(state.status, OrderStatus::Canceled);
    }

    #[test]
    fn test_book_queries_under_manager() {
        let (_, manager) = manager();
        manager.submit_order(Order::limit(1, 0, "EUR/USD", Side::Buy, 1.08, 1.0, 0));
        manager.submit_order(Order::limit(2, 0, "EUR/USD", Side::Sell, 1.10, 1.0, 0));

        assert_eq!(manager.best_bid(), Some(1.08));
        assert_eq!(manager.best_ask(), Some(1.10));
        assert!((manager.spread().unwrap() - 0.02).abs() < 1e-9);
        assert_eq!(manager.vwap(Side::Buy, 1.0), Some(1.10));
    }
}
