// Append-only CSV history of predictions and placed orders

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::RecorderError;
use crate::models::{OrderAck, OrderIntent, Prediction};

/// Sink for decision outcomes
///
/// Callers log failures and carry on; recording never blocks a decision.
pub trait OutcomeRecorder: Send + Sync {
    fn record_prediction(
        &self,
        at: DateTime<Utc>,
        symbol: &str,
        prediction: Prediction,
    ) -> Result<(), RecorderError>;

    fn record_intent(
        &self,
        at: DateTime<Utc>,
        intent: &OrderIntent,
        ack: &OrderAck,
    ) -> Result<(), RecorderError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub enabled: bool,
    pub predictions_path: PathBuf,
    pub intents_path: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            predictions_path: PathBuf::from("data/predictions.csv"),
            intents_path: PathBuf::from("data/orders.csv"),
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictionRow<'a> {
    timestamp: String,
    symbol: &'a str,
    prediction: f64,
}

#[derive(Debug, Serialize)]
struct IntentRow<'a> {
    timestamp: String,
    symbol: &'a str,
    side: &'a str,
    price: f64,
    amount: f64,
    order_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct CsvRecorder {
    predictions_path: PathBuf,
    intents_path: PathBuf,
}

impl CsvRecorder {
    pub fn new(predictions_path: impl Into<PathBuf>, intents_path: impl Into<PathBuf>) -> Self {
        Self {
            predictions_path: predictions_path.into(),
            intents_path: intents_path.into(),
        }
    }

    pub fn from_config(config: &RecorderConfig) -> Self {
        Self::new(&config.predictions_path, &config.intents_path)
    }

    fn append<T: Serialize>(path: &Path, row: &T) -> Result<(), RecorderError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let write_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl OutcomeRecorder for CsvRecorder {
    fn record_prediction(
        &self,
        at: DateTime<Utc>,
        symbol: &str,
        prediction: Prediction,
    ) -> Result<(), RecorderError> {
        Self::append(
            &self.predictions_path,
            &PredictionRow {
                timestamp: format_timestamp(at),
                symbol,
                prediction: prediction.value(),
            },
        )
    }

    fn record_intent(
        &self,
        at: DateTime<Utc>,
        intent: &OrderIntent,
        ack: &OrderAck,
    ) -> Result<(), RecorderError> {
        Self::append(
            &self.intents_path,
            &IntentRow {
                timestamp: format_timestamp(at),
                symbol: &intent.symbol,
                side: intent.side.as_str(),
                price: intent.price,
                amount: intent.amount,
                order_id: &ack.order_id,
            },
        )
    }
}
