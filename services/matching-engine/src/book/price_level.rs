//! Price level with FIFO time priority
//!
//! A price level holds every resting order at one price, in arrival order.
//! The level caches its total resting lots so depth walks never rescan the
//! queue.

use std::collections::VecDeque;

use types::Order;

/// Orders resting at a single price, front = oldest.
#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    orders: VecDeque<Order>,
    total_lots: i64,
}

/// Outcome of an in-place partial reduction.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    /// Remaining lots hit zero; the order left the level.
    Removed(Order),
    /// The order shrank in place and kept its queue position.
    Reduced(Order),
}

impl PriceLevel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an order at the back of the queue (time priority).
    pub fn push_back(&mut self, order: Order) {
        self.total_lots += order.quantity_lots;
        self.orders.push_back(order);
    }

    /// Remove an order by id, returning it if present.
    pub fn remove(&mut self, order_id: u64) -> Option<Order> {
        let position = self.orders.iter().position(|o| o.order_id == order_id)?;
        let order = self.orders.remove(position)?;
        self.total_lots -= order.quantity_lots;
        Some(order)
    }

    /// The oldest order at this level.
    pub fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Fill `lots` against the front order. Returns the maker's id and
    /// whether the maker was exhausted (and therefore removed).
    pub fn fill_front(&mut self, lots: i64) -> Option<(u64, bool)> {
        let front = self.orders.front_mut()?;
        let fill = lots.min(front.quantity_lots);
        front.quantity_lots -= fill;
        front.quantity = types::fixed::from_quantity_lots(front.quantity_lots);
        self.total_lots -= fill;

        let order_id = front.order_id;
        if front.quantity_lots == 0 {
            self.orders.pop_front();
            Some((order_id, true))
        } else {
            Some((order_id, false))
        }
    }

    /// Reduce an order in place by `lots`, preserving its queue position.
    /// A reduction of the full remaining size removes the order instead.
    pub fn reduce(&mut self, order_id: u64, lots: i64) -> Option<Reduction> {
        let position = self.orders.iter().position(|o| o.order_id == order_id)?;
        let remaining = self.orders[position].quantity_lots;

        if lots >= remaining {
            let order = self.orders.remove(position)?;
            self.total_lots -= order.quantity_lots;
            return Some(Reduction::Removed(order));
        }

        let order = &mut self.orders[position];
        order.quantity_lots -= lots;
        order.quantity = types::fixed::from_quantity_lots(order.quantity_lots);
        self.total_lots -= lots;
        Some(Reduction::Reduced(order.clone()))
    }

    pub fn get(&self, order_id: u64) -> Option<&Order> {
        self.orders.iter().find(|o| o.order_id == order_id)
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn total_lots(&self) -> i64 {
        self.total_lots
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::Side;

    fn order(id: u64, lots_nominal: f64) -> Order {
        Order::limit(id, 0, "EUR/USD", Side::Buy, 1.0, lots_nominal, 0)
    }

    #[test]
    fn test_push_back_tracks_total() {
        let mut level = PriceLevel::new();
        level.push_back(order(1, 1.5));
        level.push_back(order(2, 2.5));

        assert_eq!(level.order_count(), 2);
        assert_eq!(level.total_lots(), 4_000_000);
    }

    #[test]
    fn test_fifo_front_is_oldest() {
        let mut level = PriceLevel::new();
        level.push_back(order(1, 1.0));
        level.push_back(order(2, 2.0));

        assert_eq!(level.front().unwrap().order_id, 1);
    }

    #[test]
    fn test_remove_updates_total() {
        let mut level = PriceLevel::new();
        level.push_back(order(1, 1.0));
        level.push_back(order(2, 2.0));

        let removed = level.remove(1).unwrap();
        assert_eq!(removed.order_id, 1);
        assert_eq!(level.total_lots(), 2_000_000);
        assert!(level.remove(99).is_none());
    }

    #[test]
    fn test_fill_front_partial_keeps_order() {
        let mut level = PriceLevel::new();
        level.push_back(order(1, 2.0));

        let (id, exhausted) = level.fill_front(500_000).unwrap();
        assert_eq!(id, 1);
        assert!(!exhausted);
        assert_eq!(level.front().unwrap().quantity_lots, 1_500_000);
        assert_eq!(level.total_lots(), 1_500_000);
    }

    #[test]
    fn test_fill_front_exhaustion_removes_order() {
        let mut level = PriceLevel::new();
        level.push_back(order(1, 1.0));
        level.push_back(order(2, 1.0));

        let (id, exhausted) = level.fill_front(1_000_000).unwrap();
        assert_eq!(id, 1);
        assert!(exhausted);
        assert_eq!(level.front().unwrap().order_id, 2);
    }

    #[test]
    fn test_reduce_preserves_queue_position() {
        let mut level = PriceLevel::new();
        level.push_back(order(1, 2.0));
        level.push_back(order(2, 1.0));

        match level.reduce(1, 500_000).unwrap() {
            Reduction::Reduced(updated) => assert_eq!(updated.quantity_lots, 1_500_000),
            other => panic!("expected Reduced, got {other:?}"),
        }
        // Order 1 still fills first.
        assert_eq!(level.front().unwrap().order_id, 1);
    }

    #[test]
    fn test_reduce_by_full_remaining_removes() {
        let mut level = PriceLevel::new();
        level.push_back(order(1, 1.0));

        match level.reduce(1, 1_000_000).unwrap() {
            Reduction::Removed(removed) => assert_eq!(removed.order_id, 1),
            other => panic!("expected Removed, got {other:?}"),
        }
        assert!(level.is_empty());
        assert_eq!(level.total_lots(), 0);
    }
}
