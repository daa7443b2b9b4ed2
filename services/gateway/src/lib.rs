//! Market gateway
//!
//! Front door of the serving core: token authorization with TTLs, rolling
//! per-principal rate limits, a latest-tick cache fed from the bus, order
//! submission combining auth with the order manager, and the HTTP/WS surface
//! (health, OpenMetrics, snapshots, orders, tick streaming).

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod router;
pub mod service;
pub mod state;

pub use error::AppError;
pub use metrics::GatewayMetrics;
pub use models::{OrderAck, OrderRequest};
pub use router::create_router;
pub use service::{
    normalize_symbol, submit_order, GatewayRejectReason, MarketGatewayService, RateLimitConfig,
    SecurityConfig,
};
pub use state::AppState;
