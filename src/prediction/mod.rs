//! Turns an annotated snapshot into a prediction score
//!
//! The engine treats the prediction as an opaque number compared against
//! thresholds. The linear model here is the built-in producer; anything
//! implementing [`Predictor`] can replace it.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::PredictionError;
use crate::models::{MarketSnapshot, Prediction};

pub trait Predictor: Send + Sync {
    /// Score the latest row of an annotated snapshot
    fn predict(&self, snapshot: &MarketSnapshot) -> Result<Prediction, PredictionError>;
}

/// Inputs available to the linear model, all taken from the latest row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// close / previous close - 1
    Return1,
    /// (high - low) / close
    RangePct,
    /// atr / close
    AtrPct,
    /// RSI rescaled from [0, 100] to [-0.5, 0.5]
    Rsi,
}

impl Feature {
    pub const ALL: [Feature; 4] = [Feature::Return1, Feature::RangePct, Feature::AtrPct, Feature::Rsi];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::Return1 => "return_1",
            Feature::RangePct => "range_pct",
            Feature::AtrPct => "atr_pct",
            Feature::Rsi => "rsi",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    fn extract(&self, snapshot: &MarketSnapshot) -> Result<f64, PredictionError> {
        let rows = snapshot.rows();
        let latest = rows.last().ok_or(PredictionError::EmptySnapshot)?;
        let close = latest.bar.close;
        let missing = || PredictionError::MissingFeature(self.name());

        if !(close.is_finite() && close > 0.0) {
            return Err(missing());
        }

        let value = match self {
            Feature::Return1 => {
                let prev = rows.len().checked_sub(2).map(|i| rows[i].bar.close);
                match prev {
                    Some(p) if p > 0.0 => close / p - 1.0,
                    _ => return Err(missing()),
                }
            }
            Feature::RangePct => (latest.bar.high - latest.bar.low) / close,
            Feature::AtrPct => latest.atr.ok_or_else(missing)? / close,
            Feature::Rsi => latest.rsi.ok_or_else(missing)? / 100.0 - 0.5,
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(missing())
        }
    }
}

/// Model parameters as they appear in configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub intercept: f64,
    /// Feature name -> weight
    pub weights: BTreeMap<String, f64>,
}

/// `intercept + sum(weight * feature)`
#[derive(Debug, Clone)]
pub struct LinearPredictor {
    intercept: f64,
    weights: Vec<(Feature, f64)>,
}

impl LinearPredictor {
    pub fn new<I, S>(intercept: f64, weights: I) -> Result<Self, PredictionError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let weights = weights
            .into_iter()
            .map(|(name, w)| {
                Feature::from_name(name.as_ref())
                    .map(|f| (f, w))
                    .ok_or_else(|| PredictionError::UnknownFeature(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if weights.is_empty() {
            tracing::warn!(intercept, "Linear predictor has no weights; prediction is constant");
        }

        Ok(Self { intercept, weights })
    }

    pub fn from_config(config: &PredictorConfig) -> Result<Self, PredictionError> {
        Self::new(config.intercept, config.weights.iter().map(|(k, v)| (k, *v)))
    }
}

impl Predictor for LinearPredictor {
    fn predict(&self, snapshot: &MarketSnapshot) -> Result<Prediction, PredictionError> {
        if snapshot.is_empty() {
            return Err(PredictionError::EmptySnapshot);
        }

        let mut score = self.intercept;
        for (feature, weight) in &self.weights {
            score += weight * feature.extract(snapshot)?;
        }
        Ok(Prediction(score))
    }
}
