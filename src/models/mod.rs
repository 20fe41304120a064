use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::OrderError;

/// OHLCV bar for a fixed interval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A bar with the indicator columns attached by the indicator pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub bar: Bar,
    pub atr: Option<f64>,
    pub rsi: Option<f64>,
}

/// Two successive bars whose spacing differs from the snapshot interval
#[derive(Debug, Clone, PartialEq)]
pub struct BarGap {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub actual: Duration,
}

/// Ordered, time-indexed table of bars for one symbol
///
/// Rows are sorted by timestamp (oldest first). The decision logic only ever
/// looks at `latest()`; history exists for the indicator computation.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub interval: Duration,
    rows: Vec<SnapshotRow>,
}

impl MarketSnapshot {
    /// Build a raw (pre-indicator) snapshot. Bars are sorted and exact
    /// timestamp duplicates dropped.
    pub fn from_bars(symbol: impl Into<String>, interval: Duration, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);

        let rows = bars
            .into_iter()
            .map(|bar| SnapshotRow {
                bar,
                atr: None,
                rsi: None,
            })
            .collect();

        Self {
            symbol: symbol.into(),
            interval,
            rows,
        }
    }

    pub fn rows(&self) -> &[SnapshotRow] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [SnapshotRow] {
        &mut self.rows
    }

    pub fn latest(&self) -> Option<&SnapshotRow> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.bar.close).collect()
    }

    /// Every place where successive timestamps are not exactly one interval apart
    pub fn gaps(&self) -> Vec<BarGap> {
        self.rows
            .windows(2)
            .filter_map(|w| {
                let actual = w[1].bar.timestamp - w[0].bar.timestamp;
                (actual != self.interval).then(|| BarGap {
                    from: w[0].bar.timestamp,
                    to: w[1].bar.timestamp,
                    actual,
                })
            })
            .collect()
    }
}

/// Model output: a forecast of expected return, compared against thresholds
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Prediction(pub f64);

impl Prediction {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// Available balance per asset symbol, as reported by the exchange
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountState {
    pub balances: HashMap<String, f64>,
}

impl AccountState {
    pub fn new(balances: HashMap<String, f64>) -> Self {
        Self { balances }
    }

    /// Available quantity of `asset`, or None if the exchange did not report it
    pub fn available(&self, asset: &str) -> Option<f64> {
        self.balances.get(asset).copied()
    }
}

/// Exchange-imposed quantity constraints for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingConstraints {
    pub min_order_size: f64,
    pub size_step: f64,
    pub tick_size: f64,
}

impl SizingConstraints {
    /// Sizing needs a positive step; anything else disables it
    pub fn is_usable(&self) -> bool {
        self.size_step.is_finite()
            && self.size_step > 0.0
            && self.min_order_size.is_finite()
            && self.min_order_size >= 0.0
            && self.tick_size.is_finite()
            && self.tick_size > 0.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(OrderError::InvalidSide(s.to_string())),
        }
    }
}

/// Desired limit order, prior to exchange acknowledgment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub amount: f64,
}

impl OrderIntent {
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        price: f64,
        amount: f64,
    ) -> Result<Self, OrderError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(OrderError::InvalidPrice(price));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(OrderError::InvalidAmount(amount));
        }

        Ok(Self {
            symbol: symbol.into(),
            side,
            price,
            amount,
        })
    }
}

/// Exchange acknowledgment of a placed order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub order_id: String,
}

/// Order still working on the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct RestingOrder {
    pub order_id: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
}
