//! Trade types produced by the matching engine

use crate::fixed;
use crate::order::Side;
use serde::{Deserialize, Serialize};

/// An atomic exchange between a resting maker and an incoming taker.
///
/// Emitted once by the book during matching and never stored there; trade ids
/// come from a per-book monotonic counter. Prices and quantities are integer
/// ticks/lots; `side` is the aggressor's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: u64,
    pub maker_order_id: u64,
    pub taker_order_id: u64,
    pub timestamp_ns: u64,
    pub price_ticks: i64,
    pub quantity_lots: i64,
    pub side: Side,
}

impl Trade {
    /// Execution price in nominal units.
    pub fn price(&self) -> f64 {
        fixed::from_price_ticks(self.price_ticks)
    }

    /// Executed quantity in nominal units.
    pub fn quantity(&self) -> f64 {
        fixed::from_quantity_lots(self.quantity_lots)
    }

    /// Notional in units, signed by the aggressor side.
    pub fn signed_notional_units(&self) -> i64 {
        let gross = fixed::to_notional_units(self.price_ticks, self.quantity_lots).saturating_abs();
        match self.side {
            Side::Buy => gross,
            Side::Sell => gross.saturating_neg(),
        }
    }
}
