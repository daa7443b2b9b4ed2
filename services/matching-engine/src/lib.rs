//! Limit order book and matching
//!
//! One `OrderBook` per instrument: price-level maps on both sides, FIFO time
//! priority within a level, an order-id lookup index for O(1) cancels, and
//! price-time priority matching over integer ticks and lots.

pub mod book;

pub use book::{BookError, OrderBook, PartialCancel};
