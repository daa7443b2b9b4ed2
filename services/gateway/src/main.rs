//! Gateway binary: wire the bus, risk, book, manager, and HTTP surface
//! together and serve. A small synthetic feeder stands in for the external
//! feed player so the ingress path is observable out of the box.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use gateway::{create_router, AppState, MarketGatewayService, RateLimitConfig, SecurityConfig};
use matching_engine::OrderBook;
use message_bus::{codec, BackpressurePolicy, BusConfig, MessageBus};
use order_manager::OrderManager;
use risk_engine::{RiskLimits, RiskManager};
use types::{time, MarketTick, Side};

const MARKET_TOPIC: &str = "market.ticks";
const DEFAULT_SYMBOL: &str = "EUR/USD";

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    info!("starting market gateway service");

    let bus = Arc::new(MessageBus::new(BusConfig {
        queue_capacity: 4_096,
        policy: BackpressurePolicy::DropOldest,
        block_timeout_ms: 0,
        consumer_threads: 1,
    }));

    let risk = Arc::new(RiskManager::new(RiskLimits::default()));
    let orders = Arc::new(OrderManager::new(risk, OrderBook::new(DEFAULT_SYMBOL)));

    let security = SecurityConfig {
        api_token: std::env::var("GATEWAY_API_TOKEN").unwrap_or_default(),
        rate_limit: RateLimitConfig::default(),
        default_token_ttl_ms: 0,
    };
    let gateway = Arc::new(MarketGatewayService::new(MARKET_TOPIC, security));
    gateway.start(&bus);

    spawn_demo_feeder(bus.clone());

    let state = AppState::new(gateway, orders);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Publish a slow synthetic tick stream on the market topic.
fn spawn_demo_feeder(bus: Arc<MessageBus>) {
    tokio::spawn(async move {
        let mut price = 1.0850_f64;
        let mut step = 0u64;
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            step += 1;
            // Deterministic small oscillation around the starting price.
            let drift = ((step % 20) as f64 - 10.0) * 0.0001;
            price = 1.0850 + drift;

            let tick = MarketTick::new(
                time::unix_now_ns(),
                price,
                0.5 + (step % 5) as f64 * 0.25,
                DEFAULT_SYMBOL,
                "DEMO",
                if step % 2 == 0 { Side::Buy } else { Side::Sell },
            );
            let encoded = codec::encode_market_tick_v2(&tick, true);
            let _ = bus.publish(MARKET_TOPIC, &encoded);
        }
    });
}
