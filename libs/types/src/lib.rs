//! Core type definitions for the FX serving core
//!
//! Shared across every service crate: fixed-point price/quantity arithmetic,
//! market ticks, orders, and trades. All internal accounting is integer
//! ticks/lots; floats appear only at the JSON and feed boundaries.
//!
//! # Modules
//! - `fixed`: integer fixed-point conversions and notional arithmetic
//! - `tick`: market tick events
//! - `order`: order sides, types, and scalar normalization
//! - `trade`: trades emitted by the matching engine

pub mod fixed;
pub mod order;
pub mod tick;
pub mod time;
pub mod trade;

pub use order::{Order, OrderType, Side};
pub use tick::MarketTick;
pub use trade::Trade;
