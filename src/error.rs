//! Error types shared across the crate

use thiserror::Error;

use crate::models::Side;

/// Failures talking to the exchange or market data endpoints
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: i64, message: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Unsupported bar interval: {0} minutes")]
    UnsupportedInterval(i64),
}

/// Rejected order construction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Invalid order side: {0:?} (expected buy or sell)")]
    InvalidSide(String),

    #[error("Invalid order price: {0}")]
    InvalidPrice(f64),

    #[error("Invalid order amount: {0}")]
    InvalidAmount(f64),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    #[error("Cannot open {requested} position while holding {held}")]
    Conflict {
        held: &'static str,
        requested: &'static str,
    },
}

/// Why an evaluation was abandoned
///
/// Every variant leaves the tracked position untouched.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{operation} failed for {symbol}: {source}")]
    Gateway {
        operation: &'static str,
        symbol: String,
        #[source]
        source: GatewayError,
    },

    /// Resting orders were cancelled but the replacement never landed
    #[error(
        "order submission failed after cancel-all for {symbol} ({side} {amount} @ {price}): {source}"
    )]
    SubmitAfterCancel {
        symbol: String,
        side: Side,
        price: f64,
        amount: f64,
        #[source]
        source: GatewayError,
    },

    #[error("Order for {got} routed through the {expected} reconciler")]
    SymbolMismatch { expected: String, got: String },

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Position(#[from] PositionError),
}

impl EngineError {
    pub(crate) fn gateway(operation: &'static str, symbol: &str, source: GatewayError) -> Self {
        EngineError::Gateway {
            operation,
            symbol: symbol.to_string(),
            source,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("Snapshot is empty")]
    EmptySnapshot,

    #[error("Feature {0} unavailable on the latest bar")]
    MissingFeature(&'static str),

    #[error("Unknown feature in model weights: {0}")]
    UnknownFeature(String),
}

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Failure of one scheduled run, before or during evaluation
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("market data fetch failed: {0}")]
    MarketData(#[source] GatewayError),

    #[error("prediction failed: {0}")]
    Prediction(#[from] PredictionError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
