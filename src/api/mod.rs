// Exchange and market data collaborators
pub mod auth;
pub mod gmo;

pub use gmo::{GmoClient, GmoConfig};

use async_trait::async_trait;
use chrono::Duration;

use crate::error::GatewayError;
use crate::models::{AccountState, MarketSnapshot, OrderAck, OrderIntent, SizingConstraints};

/// Source of recent OHLCV bars
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Raw (pre-indicator) snapshot of at most `lookback` most recent bars
    async fn fetch_recent_bars(
        &self,
        symbol: &str,
        interval: Duration,
        lookback: usize,
    ) -> Result<MarketSnapshot, GatewayError>;
}

/// Account and order operations on the exchange
///
/// Authentication and request signing are internal to implementations.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn fetch_balance(&self) -> Result<AccountState, GatewayError>;

    async fn fetch_instrument_constraints(
        &self,
        symbol: &str,
    ) -> Result<SizingConstraints, GatewayError>;

    /// Cancel every resting order for `symbol`, returning how many were cancelled
    async fn cancel_all_orders(&self, symbol: &str) -> Result<usize, GatewayError>;

    async fn submit_limit_order(&self, intent: &OrderIntent) -> Result<OrderAck, GatewayError>;
}
