//! Market tick events as observed from upstream feeds

use crate::order::Side;
use serde::{Deserialize, Serialize};

/// Wire capacity for a tick symbol, including the terminating NUL.
pub const SYMBOL_LEN: usize = 16;

/// Wire capacity for a tick source, including the terminating NUL.
pub const SOURCE_LEN: usize = 8;

/// One observed trade/quote event on a symbol.
///
/// Ticks are produced by the feeder, broadcast over the bus, and cached by
/// the gateway; nothing owns them after broadcast. Symbol and source are
/// capped at `SYMBOL_LEN - 1` / `SOURCE_LEN - 1` meaningful bytes by the
/// codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTick {
    pub timestamp_ns: u64,
    pub price: f64,
    pub quantity: f64,
    pub symbol: String,
    pub source: String,
    pub side: Side,
}

impl MarketTick {
    pub fn new(
        timestamp_ns: u64,
        price: f64,
        quantity: f64,
        symbol: impl Into<String>,
        source: impl Into<String>,
        side: Side,
    ) -> Self {
        Self {
            timestamp_ns,
            price,
            quantity,
            symbol: symbol.into(),
            source: source.into(),
            side,
        }
    }
}
