//! Shared application state for the HTTP layer

use std::sync::Arc;

use order_manager::OrderManager;

use crate::service::MarketGatewayService;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<MarketGatewayService>,
    pub orders: Arc<OrderManager>,
}

impl AppState {
    pub fn new(gateway: Arc<MarketGatewayService>, orders: Arc<OrderManager>) -> Self {
        Self { gateway, orders }
    }
}
