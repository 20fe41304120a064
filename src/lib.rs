// Core modules
pub mod api;
pub mod config;
pub mod cycle;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod prediction;
pub mod recorder;
pub mod schedule;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use api::{ExchangeGateway, GmoClient, GmoConfig, MarketDataGateway};
pub use config::{load_config, AppConfig};
pub use cycle::TradingCycle;
pub use error::{CycleError, EngineError, GatewayError, OrderError};
pub use execution::{Direction, PositionTracker, TradingEngine};
pub use models::*;
pub use strategy::{Evaluation, SignalEvaluator, StrategyConfig, TradingMode};
