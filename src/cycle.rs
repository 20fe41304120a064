// One scheduled run: fetch -> annotate -> predict -> record -> evaluate

use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

use crate::api::{ExchangeGateway, MarketDataGateway};
use crate::config::MarketDataConfig;
use crate::error::CycleError;
use crate::execution::TradingEngine;
use crate::indicators::annotate;
use crate::models::{MarketSnapshot, Prediction};
use crate::prediction::Predictor;
use crate::recorder::OutcomeRecorder;
use crate::strategy::Evaluation;

pub struct TradingCycle<M: MarketDataGateway, G: ExchangeGateway> {
    market_data: M,
    engine: TradingEngine<G>,
    predictor: Box<dyn Predictor>,
    recorder: Option<Box<dyn OutcomeRecorder>>,
    market: MarketDataConfig,
}

impl<M: MarketDataGateway, G: ExchangeGateway> TradingCycle<M, G> {
    pub fn new(
        market_data: M,
        engine: TradingEngine<G>,
        predictor: Box<dyn Predictor>,
        market: MarketDataConfig,
    ) -> Self {
        Self {
            market_data,
            engine,
            predictor,
            recorder: None,
            market,
        }
    }

    pub fn with_recorder(mut self, recorder: Box<dyn OutcomeRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn engine(&self) -> &TradingEngine<G> {
        &self.engine
    }

    /// Run one full evaluation inside a span tagged with a fresh run id
    ///
    /// Errors are returned for the caller to log; the engine's position
    /// belief is untouched by any failed run.
    pub async fn run_once(&mut self) -> Result<Evaluation, CycleError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("evaluation", %run_id, symbol = %self.engine.symbol());
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&mut self) -> Result<Evaluation, CycleError> {
        let symbol = self.engine.symbol().to_string();

        let raw = self
            .market_data
            .fetch_recent_bars(&symbol, self.market.interval(), self.market.lookback)
            .await
            .map_err(CycleError::MarketData)?;

        if raw.is_empty() {
            tracing::warn!("No bars returned, skipping evaluation");
            return Ok(Evaluation::Skipped {
                reason: "no market data".to_string(),
            });
        }

        // A failed fetch of the newest kline day leaves only older bars
        if let Some(latest) = raw.latest().map(|row| row.bar.timestamp) {
            let age = Utc::now() - latest;
            if age > self.market.max_bar_age() {
                tracing::warn!(
                    latest = %latest,
                    age_minutes = age.num_minutes(),
                    "Latest bar is stale, skipping evaluation"
                );
                return Ok(Evaluation::Skipped {
                    reason: "stale market data".to_string(),
                });
            }
        }

        let snapshot = annotate(raw, self.market.periods);
        log_gaps(&snapshot);

        let prediction = self.predictor.predict(&snapshot)?;
        self.record_prediction(&snapshot, prediction);

        let outcome = self.engine.evaluate(&snapshot, prediction).await?;

        if let Evaluation::Placed { intent, ack, .. } = &outcome {
            if let Some(recorder) = &self.recorder {
                if let Err(e) = recorder.record_intent(Utc::now(), intent, ack) {
                    tracing::warn!(error = %e, order_id = %ack.order_id, "Failed to record order");
                }
            }
        }

        tracing::info!(
            prediction = prediction.value(),
            outcome = ?outcome,
            position = ?self.engine.tracker().side(),
            "Evaluation complete"
        );
        Ok(outcome)
    }

    fn record_prediction(&self, snapshot: &MarketSnapshot, prediction: Prediction) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        let at = snapshot
            .latest()
            .map(|row| row.bar.timestamp)
            .unwrap_or_else(Utc::now);
        if let Err(e) = recorder.record_prediction(at, &snapshot.symbol, prediction) {
            tracing::warn!(error = %e, "Failed to record prediction");
        }
    }
}

fn log_gaps(snapshot: &MarketSnapshot) {
    for gap in snapshot.gaps() {
        tracing::warn!(
            from = %gap.from,
            to = %gap.to,
            actual_minutes = gap.actual.num_minutes(),
            expected_minutes = snapshot.interval.num_minutes(),
            "Gap in bar data"
        );
    }
}
