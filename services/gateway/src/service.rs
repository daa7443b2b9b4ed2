//! Gateway core: tokens, rate limits, tick cache
//!
//! One mutex guards the three gateway tables (latest ticks, token expiries,
//! rate windows); they are consulted together on every request, so a single
//! lock keeps the invariants simple. Metric counters are atomics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use message_bus::{codec, MessageBus};
use order_manager::{OrderManager, OrderRejectReason};
use types::{time, MarketTick, Order};

use crate::metrics::GatewayMetrics;
use crate::models::{tick_json, OrderAck};

/// Rolling-window rate limit settings.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Requests allowed per window. 0 disables all requests.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 120,
            window_ms: 1_000,
        }
    }
}

/// Gateway security settings.
#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    /// Seed API token; empty means no token is configured (open access).
    pub api_token: String,
    pub rate_limit: RateLimitConfig,
    /// TTL applied to the seed token, in milliseconds. 0 = never expires.
    pub default_token_ttl_ms: u64,
}

/// Why the gateway turned a request away before it reached the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayRejectReason {
    None,
    Unauthorized,
    RateLimited,
}

impl GatewayRejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayRejectReason::None => "none",
            GatewayRejectReason::Unauthorized => "unauthorized",
            GatewayRejectReason::RateLimited => "rate_limited",
        }
    }
}

struct RateWindow {
    window_start: Instant,
    requests: u32,
}

#[derive(Default)]
struct GatewayTables {
    /// Latest tick per canonical symbol key.
    latest_ticks: HashMap<String, MarketTick>,
    /// token → expiry in unix nanos (0 = no expiry).
    token_expiry_ns: HashMap<String, u64>,
    /// Rolling request windows keyed by token (or "anonymous").
    rate_windows: HashMap<String, RateWindow>,
}

/// Market gateway service.
pub struct MarketGatewayService {
    market_topic: String,
    security: SecurityConfig,
    started: AtomicBool,

    tables: Mutex<GatewayTables>,

    ticks_received: AtomicU64,
    ticks_decoded: AtomicU64,
    decode_errors: AtomicU64,
    order_requests: AtomicU64,
    order_accepted: AtomicU64,
    order_rejected: AtomicU64,
    auth_failures: AtomicU64,
    rate_limited: AtomicU64,

    tick_tx: broadcast::Sender<String>,
}

impl MarketGatewayService {
    pub fn new(market_topic: impl Into<String>, security: SecurityConfig) -> Self {
        let (tick_tx, _) = broadcast::channel(1_024);
        let service = Self {
            market_topic: market_topic.into(),
            security,
            started: AtomicBool::new(false),
            tables: Mutex::new(GatewayTables::default()),
            ticks_received: AtomicU64::new(0),
            ticks_decoded: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            order_requests: AtomicU64::new(0),
            order_accepted: AtomicU64::new(0),
            order_rejected: AtomicU64::new(0),
            auth_failures: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            tick_tx,
        };

        if !service.security.api_token.is_empty() {
            let expiry_ns = expiry_from_ttl(service.security.default_token_ttl_ms);
            let mut tables = service.tables.lock().expect("gateway mutex poisoned");
            tables
                .token_expiry_ns
                .insert(service.security.api_token.clone(), expiry_ns);
        }

        service
    }

    /// Subscribe to the market topic and begin feeding the tick cache.
    /// Idempotent: only the first call registers the subscription.
    pub fn start(self: &Arc<Self>, bus: &MessageBus) {
        if self
            .started
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let service = Arc::clone(self);
        bus.subscribe(&self.market_topic, move |payload| {
            service.on_market_message(payload);
        });
        info!(topic = self.market_topic.as_str(), "gateway subscribed to market feed");
    }

    pub fn stop(&self) {
        self.started.store(false, Ordering::Relaxed);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    fn on_market_message(&self, payload: &[u8]) {
        if !self.is_started() {
            return;
        }
        self.ticks_received.fetch_add(1, Ordering::Relaxed);

        let tick = match codec::decode_market_tick(payload) {
            Ok(tick) => tick,
            Err(err) => {
                self.decode_errors.fetch_add(1, Ordering::Relaxed);
                debug!(%err, "dropping undecodable market message");
                return;
            }
        };

        {
            let mut tables = self.tables.lock().expect("gateway mutex poisoned");
            tables
                .latest_ticks
                .insert(normalize_symbol(&tick.symbol), tick.clone());
        }
        self.ticks_decoded.fetch_add(1, Ordering::Relaxed);

        // Fan the decoded tick out to any connected WS clients.
        let _ = self.tick_tx.send(tick_json(&tick).to_string());
    }

    /// Latest tick for a symbol in any of its spellings.
    pub fn latest_tick(&self, symbol: &str) -> Option<MarketTick> {
        let tables = self.tables.lock().expect("gateway mutex poisoned");
        tables.latest_ticks.get(&normalize_symbol(symbol)).cloned()
    }

    /// Latest tick rendered as the WS/JSON event, `{}` when unknown.
    pub fn latest_tick_json(&self, symbol: &str) -> serde_json::Value {
        match self.latest_tick(symbol) {
            Some(tick) => tick_json(&tick),
            None => json!({}),
        }
    }

    /// Receiver for the tick broadcast (one JSON string per decoded tick).
    pub fn subscribe_ticks(&self) -> broadcast::Receiver<String> {
        self.tick_tx.subscribe()
    }

    /// Authorize one request for `token`.
    ///
    /// Token check first (an empty token table means auth is open), then one
    /// slot is consumed from the token's rolling rate window. Counters are
    /// bumped according to the outcome; `count_as_order_request` additionally
    /// ties failures into the order-rejected counter.
    pub fn authorize_request(
        &self,
        token: &str,
        count_as_order_request: bool,
    ) -> Result<(), GatewayRejectReason> {
        if count_as_order_request {
            self.order_requests.fetch_add(1, Ordering::Relaxed);
        }

        let mut tables = self.tables.lock().expect("gateway mutex poisoned");
        let now_ns = time::unix_now_ns();

        if !token_allowed(&mut tables.token_expiry_ns, token, now_ns) {
            self.auth_failures.fetch_add(1, Ordering::Relaxed);
            if count_as_order_request {
                self.order_rejected.fetch_add(1, Ordering::Relaxed);
            }
            return Err(GatewayRejectReason::Unauthorized);
        }

        let key = if token.is_empty() { "anonymous" } else { token };
        if !consume_rate_limit(&mut tables.rate_windows, self.security.rate_limit, key) {
            self.rate_limited.fetch_add(1, Ordering::Relaxed);
            if count_as_order_request {
                self.order_rejected.fetch_add(1, Ordering::Relaxed);
            }
            return Err(GatewayRejectReason::RateLimited);
        }

        Ok(())
    }

    /// Register (or refresh) a token. `ttl_ms` of 0 means no expiry.
    pub fn add_token(&self, token: &str, ttl_ms: u64) -> bool {
        if token.is_empty() {
            return false;
        }
        let mut tables = self.tables.lock().expect("gateway mutex poisoned");
        tables
            .token_expiry_ns
            .insert(token.to_string(), expiry_from_ttl(ttl_ms));
        true
    }

    pub fn revoke_token(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        let mut tables = self.tables.lock().expect("gateway mutex poisoned");
        tables.token_expiry_ns.remove(token).is_some()
    }

    /// Atomic remove-then-add; succeeds only if `old_token` existed.
    pub fn rotate_token(&self, old_token: &str, new_token: &str, ttl_ms: u64) -> bool {
        if old_token.is_empty() || new_token.is_empty() {
            return false;
        }
        let mut tables = self.tables.lock().expect("gateway mutex poisoned");
        if tables.token_expiry_ns.remove(old_token).is_none() {
            return false;
        }
        tables
            .token_expiry_ns
            .insert(new_token.to_string(), expiry_from_ttl(ttl_ms));
        true
    }

    /// Fold a final submission outcome into the accepted/rejected counters.
    pub fn record_order_result(&self, accepted: bool) {
        if accepted {
            self.order_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.order_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn metrics(&self) -> GatewayMetrics {
        let tracked_symbols = {
            let tables = self.tables.lock().expect("gateway mutex poisoned");
            tables.latest_ticks.len() as u64
        };
        GatewayMetrics {
            ticks_received: self.ticks_received.load(Ordering::Relaxed),
            ticks_decoded: self.ticks_decoded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            order_requests: self.order_requests.load(Ordering::Relaxed),
            order_accepted: self.order_accepted.load(Ordering::Relaxed),
            order_rejected: self.order_rejected.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            tracked_symbols,
        }
    }

    pub fn reset_metrics(&self) {
        self.ticks_received.store(0, Ordering::Relaxed);
        self.ticks_decoded.store(0, Ordering::Relaxed);
        self.decode_errors.store(0, Ordering::Relaxed);
        self.order_requests.store(0, Ordering::Relaxed);
        self.order_accepted.store(0, Ordering::Relaxed);
        self.order_rejected.store(0, Ordering::Relaxed);
        self.auth_failures.store(0, Ordering::Relaxed);
        self.rate_limited.store(0, Ordering::Relaxed);
    }

    /// Health payload: status plus all gateway counters.
    pub fn health_json(&self) -> serde_json::Value {
        let metrics = self.metrics();
        let status = if !self.is_started() {
            "down"
        } else if metrics.decode_errors > 0 {
            "degraded"
        } else {
            "ok"
        };
        let mut body = serde_json::to_value(&metrics).expect("metrics serialize");
        let object = body.as_object_mut().expect("metrics is an object");
        object.insert("status".into(), json!(status));
        object.insert("timestamp_ns".into(), json!(time::unix_now_ns()));
        body
    }
}

/// Canonical cache key for a symbol: strip `/ - _ space`, uppercase. Used
/// only for keying; cached ticks keep their ingested spelling.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_' | ' '))
        .flat_map(char::to_uppercase)
        .collect()
}

/// Authorize against the gateway then hand the order to the manager,
/// recording the final outcome in the gateway counters.
pub fn submit_order(
    gateway: &MarketGatewayService,
    manager: &OrderManager,
    order: Order,
    api_token: &str,
) -> OrderAck {
    if let Err(reason) = gateway.authorize_request(api_token, true) {
        warn!(
            order_id = order.order_id,
            reason = reason.as_str(),
            "order refused at gateway"
        );
        return OrderAck {
            order_id: order.order_id,
            accepted: false,
            resting: false,
            filled_quantity: 0.0,
            remaining_quantity: order.quantity,
            reject_reason: OrderRejectReason::None,
            gateway_reject_reason: reason,
        };
    }

    let order_id = order.order_id;
    let result = manager.submit_order(order);
    let ack = OrderAck::from_submission(order_id, &result);
    gateway.record_order_result(ack.accepted);
    ack
}

fn expiry_from_ttl(ttl_ms: u64) -> u64 {
    if ttl_ms == 0 {
        0
    } else {
        time::unix_now_ns() + ttl_ms.saturating_mul(1_000_000)
    }
}

/// Token check under the gateway lock. An empty table means authorization is
/// open; expired entries are erased as they are discovered.
fn token_allowed(tokens: &mut HashMap<String, u64>, token: &str, now_ns: u64) -> bool {
    if tokens.is_empty() {
        return true;
    }
    let Some(&expiry_ns) = tokens.get(token) else {
        return false;
    };
    if expiry_ns != 0 && now_ns > expiry_ns {
        tokens.remove(token);
        return false;
    }
    true
}

/// Consume one slot from the key's rolling window, resetting the window once
/// its start is older than `window_ms`.
fn consume_rate_limit(
    windows: &mut HashMap<String, RateWindow>,
    config: RateLimitConfig,
    key: &str,
) -> bool {
    let now = Instant::now();
    let window = Duration::from_millis(config.window_ms.max(1));

    let state = windows.entry(key.to_string()).or_insert(RateWindow {
        window_start: now,
        requests: 0,
    });
    if now.duration_since(state.window_start) >= window {
        state.window_start = now;
        state.requests = 0;
    }

    if config.max_requests == 0 {
        return false;
    }
    if state.requests >= config.max_requests {
        return false;
    }
    state.requests += 1;
    true
}
