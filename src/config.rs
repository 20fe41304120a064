//! Application configuration
//!
//! Priority (highest to lowest):
//! 1. Environment variables prefixed with `ATR_TRADER__` (`__` separates levels)
//! 2. TOML configuration file
//! 3. Defaults
//!
//! Exchange credentials only ever come from `GMO_API_KEY` / `GMO_SECRET_KEY`.

use anyhow::{Context, Result};
use chrono::Duration;
use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

use crate::api::GmoConfig;
use crate::indicators::IndicatorPeriods;
use crate::prediction::PredictorConfig;
use crate::recorder::RecorderConfig;
use crate::schedule::ScheduleConfig;
use crate::strategy::StrategyConfig;

pub const DEFAULT_CONFIG_PATH: &str = "atr-trader.toml";
pub const ENV_PREFIX: &str = "ATR_TRADER";
pub const API_KEY_VAR: &str = "GMO_API_KEY";
pub const SECRET_KEY_VAR: &str = "GMO_SECRET_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub interval_minutes: u32,
    /// Bars kept in each snapshot
    pub lookback: usize,
    pub periods: IndicatorPeriods,
    /// A snapshot whose latest bar opened more than this many intervals
    /// ago is not traded on
    pub max_bar_age_intervals: u32,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 15,
            lookback: 100,
            periods: IndicatorPeriods::default(),
            max_bar_age_intervals: 2,
        }
    }
}

impl MarketDataConfig {
    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes))
    }

    pub fn max_bar_age(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes) * i64::from(self.max_bar_age_intervals))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub exchange: GmoConfig,
    pub strategy: StrategyConfig,
    pub market_data: MarketDataConfig,
    pub schedule: ScheduleConfig,
    pub recorder: RecorderConfig,
    pub predictor: PredictorConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;
        self.schedule.validate()?;

        let md = &self.market_data;
        if md.interval_minutes == 0 {
            anyhow::bail!("market_data.interval_minutes must be positive");
        }
        if md.max_bar_age_intervals == 0 {
            anyhow::bail!("market_data.max_bar_age_intervals must be positive");
        }
        if md.periods.atr == 0 || md.periods.rsi == 0 {
            anyhow::bail!("market_data.periods must be positive");
        }
        // ATR needs period + 1 bars before its first value
        if md.lookback <= md.periods.atr.max(md.periods.rsi) {
            anyhow::bail!(
                "market_data.lookback ({}) must exceed the indicator periods",
                md.lookback
            );
        }
        if self.exchange.requests_per_second == 0 {
            anyhow::bail!("exchange.requests_per_second must be positive");
        }
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        !self.exchange.api_key.is_empty() && !self.exchange.secret_key.is_empty()
    }
}

/// Load configuration from an optional TOML file and the environment
///
/// An explicitly given path must exist; the default path is optional.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    builder = match path {
        Some(p) => builder.add_source(File::from(p).format(FileFormat::Toml).required(true)),
        None => builder.add_source(
            File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(false),
        ),
    };

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let mut app: AppConfig = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    if let Ok(key) = std::env::var(API_KEY_VAR) {
        app.exchange.api_key = key;
    }
    if let Ok(secret) = std::env::var(SECRET_KEY_VAR) {
        app.exchange.secret_key = secret;
    }

    app.validate()?;
    Ok(app)
}
