//! In-process message bus
//!
//! Topic-based fan-out with bounded per-topic queues, configurable
//! backpressure policies, per-topic worker threads, and publish metrics.
//! Also home to the wire envelope (V1/V2 headers with optional CRC32) and
//! the market tick codec used by feeders and the gateway.

pub mod bus;
pub mod codec;
pub mod config;
pub mod metrics;
pub mod protocol;

pub use bus::{BusError, MessageBus};
pub use config::{BackpressurePolicy, BusConfig};
pub use metrics::TopicMetrics;
