// Trading strategy module
pub mod evaluator;
pub mod limit_price;
pub mod sizing;

pub use evaluator::{Action, Evaluation, Plan, SignalEvaluator};
pub use limit_price::{limit_prices, LimitPrices, PriceSnap};
pub use sizing::{floor_to_step, position_size};

use serde::Deserialize;

/// Which directions the state machine may enter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    /// FLAT <-> LONG only
    LongOnly,
    /// FLAT <-> LONG and FLAT <-> SHORT, never both at once
    LongShort,
}

/// Parameters of the ATR limit-order strategy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub symbol: String,
    /// Asset held after a long entry
    pub base_asset: String,
    /// Asset spent on entries
    pub quote_asset: String,
    pub mode: TradingMode,
    pub long_threshold: f64,
    pub short_threshold: f64,
    pub atr_ratio: f64,
    pub equity_fraction: f64,
    /// Snap the limit distance to the instrument's steps (coarse-tick venues)
    pub snap_distance: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC".to_string(),
            base_asset: "BTC".to_string(),
            quote_asset: "JPY".to_string(),
            mode: TradingMode::LongOnly,
            long_threshold: 0.01,
            short_threshold: -0.01,
            atr_ratio: 0.9,
            equity_fraction: 0.7,
            snap_distance: true,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.symbol.trim().is_empty() {
            anyhow::bail!("strategy.symbol must not be empty");
        }
        if !(self.equity_fraction > 0.0 && self.equity_fraction <= 1.0) {
            anyhow::bail!(
                "strategy.equity_fraction must be in (0, 1], got {}",
                self.equity_fraction
            );
        }
        if !(self.atr_ratio.is_finite() && self.atr_ratio > 0.0) {
            anyhow::bail!("strategy.atr_ratio must be positive, got {}", self.atr_ratio);
        }
        if !self.long_threshold.is_finite() || !self.short_threshold.is_finite() {
            anyhow::bail!("strategy thresholds must be finite");
        }
        if self.mode == TradingMode::LongShort && self.short_threshold >= self.long_threshold {
            anyhow::bail!(
                "strategy.short_threshold ({}) must be below long_threshold ({})",
                self.short_threshold,
                self.long_threshold
            );
        }
        Ok(())
    }
}
