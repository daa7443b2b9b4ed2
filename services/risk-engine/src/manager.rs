//! Atomic exposure accounting
//!
//! `check_order` reserves an order's signed notional with a compare-exchange
//! loop so the exposure bound holds under concurrent submissions. Fills
//! transfer reservation into realized exposure; cancels release it.

use std::sync::atomic::{AtomicI64, Ordering};

use tracing::warn;

use types::fixed::NOTIONAL_SCALE;
use types::{Order, OrderType};

use crate::limits::RiskLimits;

/// Thread-safe pre-trade risk checker.
#[derive(Debug)]
pub struct RiskManager {
    limits: RiskLimits,
    committed_units: AtomicI64,
    filled_units: AtomicI64,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            committed_units: AtomicI64::new(0),
            filled_units: AtomicI64::new(0),
        }
    }

    /// Validate an order against the limits and, on success, reserve its
    /// signed notional in `committed`. A `false` return leaves no residue.
    pub fn check_order(&self, order: &Order) -> bool {
        if !is_valid_order(order) {
            warn!(order_id = order.order_id, "risk reject: invalid order fields");
            return false;
        }

        let order_value = (order.price * order.quantity).abs();
        if order_value > self.limits.max_order_value {
            warn!(
                order_id = order.order_id,
                order_value,
                limit = self.limits.max_order_value,
                "risk reject: order value exceeds limit"
            );
            return false;
        }

        let delta = order.signed_notional_units();
        let mut current = self.committed_units.load(Ordering::Relaxed);
        loop {
            let proposed = current.saturating_add(delta);
            let proposed_exposure = proposed.saturating_abs() as f64 / NOTIONAL_SCALE as f64;
            if proposed_exposure > self.limits.max_position_exposure {
                warn!(
                    order_id = order.order_id,
                    proposed_exposure,
                    limit = self.limits.max_position_exposure,
                    "risk reject: exposure limit exceeded"
                );
                return false;
            }
            match self.committed_units.compare_exchange_weak(
                current,
                proposed,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Transfer an executed portion from reserved to realized exposure.
    /// Call with the fill leg priced at the trade price/quantity.
    pub fn on_fill(&self, order: &Order) {
        if !is_valid_order(order) {
            return;
        }
        let delta = order.signed_notional_units();
        self.filled_units.fetch_add(delta, Ordering::Relaxed);
        self.committed_units.fetch_sub(delta, Ordering::Relaxed);
    }

    /// Release the reservation held for an unfilled portion.
    pub fn on_cancel(&self, order: &Order) {
        if !is_valid_order(order) {
            return;
        }
        let delta = order.signed_notional_units();
        self.committed_units.fetch_sub(delta, Ordering::Relaxed);
    }

    /// Reserved plus resting exposure, in nominal units.
    pub fn committed_exposure(&self) -> f64 {
        self.committed_exposure_units() as f64 / NOTIONAL_SCALE as f64
    }

    /// Net executed exposure, in nominal units.
    pub fn filled_exposure(&self) -> f64 {
        self.filled_exposure_units() as f64 / NOTIONAL_SCALE as f64
    }

    pub fn committed_exposure_units(&self) -> i64 {
        self.committed_units.load(Ordering::Relaxed)
    }

    pub fn filled_exposure_units(&self) -> i64 {
        self.filled_units.load(Ordering::Relaxed)
    }
}

fn is_valid_order(order: &Order) -> bool {
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
    use types::Side;

    fn manager() -> RiskManager {
        RiskManager::new(RiskLimits {
            max_order_value: 1_000.0,
            max_position_exposure: 2_000.0,
            max_daily_loss: 100_000.0,
        })
    }

    fn limit_order(id: u64, side: Side, price: f64, quantity: f64) -> Order {
        Order::limit(id, 0, "EUR/USD", side, price, quantity, 0)
    }

    #[test]
    fn test_reservation_on_accept() {
        let risk = manager();
        assert!(risk.check_order(&limit_order(1, Side::Buy, 100.0, 5.0)));
        assert_eq!(risk.committed_exposure(), 500.0);
        assert_eq!(risk.filled_exposure(), 0.0);
    }

    #[test]
    fn test_order_value_limit() {
        let risk = manager();
        assert!(!risk.check_order(&limit_order(1, Side::Buy, 100.0, 11.0)));
        assert_eq!(risk.committed_exposure_units(), 0);
    }

    #[test]
    fn test_exposure_limit_rejects_without_residue() {
        let risk = manager();
        assert!(risk.check_order(&limit_order(1, Side::Buy, 100.0, 10.0)));
        assert!(risk.check_order(&limit_order(2, Side::Buy, 100.0, 10.0)));
        // 2500 > 2000 exposure limit
        assert!(!risk.check_order(&limit_order(3, Side::Buy, 100.0, 5.0)));
        assert_eq!(risk.committed_exposure(), 2_000.0);
    }

    #[test]
    fn test_opposite_sides_net_out() {
        let risk = manager();
        assert!(risk.check_order(&limit_order(1, Side::Buy, 100.0, 10.0)));
        assert!(risk.check_order(&limit_order(2, Side::Sell, 100.0, 10.0)));
        assert_eq!(risk.committed_exposure(), 0.0);
        // Netting left headroom for more.
        assert!(risk.check_order(&limit_order(3, Side::Buy, 100.0, 10.0)));
    }

    #[test]
    fn test_fill_transfers_reservation() {
        let risk = manager();
        let order = limit_order(1, Side::Buy, 100.0, 5.0);
        assert!(risk.check_order(&order));

        risk.on_fill(&order);
        assert_eq!(risk.committed_exposure(), 0.0);
        assert_eq!(risk.filled_exposure(), 500.0);
    }

    #[test]
    fn test_cancel_releases_reservation() {
        let risk = manager();
        let order = limit_order(1, Side::Sell, 100.0, 5.0);
        assert!(risk.check_order(&order));
        assert_eq!(risk.committed_exposure(), -500.0);

        risk.on_cancel(&order);
        assert_eq!(risk.committed_exposure(), 0.0);
        assert_eq!(risk.filled_exposure(), 0.0);
    }

    #[test]
    fn test_invalid_order_rejected() {
        let risk = manager();
        let mut order = limit_order(1, Side::Buy, 100.0, 5.0);
        order.quantity_lots = 0;
        assert!(!risk.check_order(&order));

        let mut negative_price = limit_order(2, Side::Buy, 1.0, 1.0);
        negative_price.price_ticks = -1;
        assert!(!risk.check_order(&negative_price));
    }

    #[test]
    fn test_filled_is_additive_across_process_life() {
        let risk = manager();
        let buy = limit_order(1, Side::Buy, 100.0, 2.0);
        let sell = limit_order(2, Side::Sell, 100.0, 1.0);
        assert!(risk.check_order(&buy));
        assert!(risk.check_order(&sell));

        risk.on_fill(&buy);
        risk.on_fill(&sell);
        assert_eq!(risk.filled_exposure(), 100.0);
    }

    #[test]
    fn test_concurrent_reservations_respect_limit() {
        use std::sync::Arc;

        let risk = Arc::new(manager());
        let mut handles = Vec::new();
        for i in 0..8 {
            let risk = risk.clone();
            handles.push(std::thread::spawn(move || {
                let mut accepted = 0u32;
                for j in 0..100 {
                    let order = limit_order(i * 1_000 + j, Side::Buy, 100.0, 1.0);
                    if risk.check_order(&order) {
                        accepted += 1;
                    }
                }
                accepted
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // 100 notional each against a 2000 exposure cap.
        assert_eq!(total, 20);
        assert_eq!(risk.committed_exposure(), 2_000.0);
    }
}
