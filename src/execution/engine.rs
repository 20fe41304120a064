use crate::api::ExchangeGateway;
use crate::error::EngineError;
use crate::execution::PositionTracker;
use crate::models::{MarketSnapshot, Prediction, SizingConstraints};
use crate::strategy::{Evaluation, SignalEvaluator, StrategyConfig};

/// One strategy instance bound to one instrument and one exchange
///
/// Owns the position belief. `evaluate` takes `&mut self`, so two
/// evaluations for the same instance can never run concurrently.
pub struct TradingEngine<G: ExchangeGateway> {
    gateway: G,
    evaluator: SignalEvaluator,
    tracker: PositionTracker,
}

impl<G: ExchangeGateway> TradingEngine<G> {
    /// Query the instrument constraints once and build the engine
    ///
    /// Missing or unusable metadata disables sizing: no entries are emitted
    /// until a later evaluation refetches valid constraints.
    pub async fn new(gateway: G, config: StrategyConfig) -> Self {
        let constraints = match gateway.fetch_instrument_constraints(&config.symbol).await {
            Ok(c) if c.is_usable() => {
                tracing::info!(
                    symbol = %config.symbol,
                    min_order_size = c.min_order_size,
                    size_step = c.size_step,
                    tick_size = c.tick_size,
                    "Loaded instrument constraints"
                );
                Some(c)
            }
            Ok(c) => {
                tracing::error!(
                    symbol = %config.symbol,
                    constraints = ?c,
                    "Instrument constraints unusable (size_step must be > 0), sizing disabled"
                );
                None
            }
            Err(e) => {
                tracing::error!(
                    symbol = %config.symbol,
                    error = %e,
                    "Failed to fetch instrument constraints, sizing disabled"
                );
                None
            }
        };

        Self {
            gateway,
            evaluator: SignalEvaluator::new(config, constraints),
            tracker: PositionTracker::new(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn evaluator(&self) -> &SignalEvaluator {
        &self.evaluator
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn symbol(&self) -> &str {
        &self.evaluator.config().symbol
    }

    async fn refetch_constraints(&mut self) {
        let symbol = self.symbol().to_string();
        match self.gateway.fetch_instrument_constraints(&symbol).await {
            Ok(c) if c.is_usable() => {
                tracing::info!(symbol = %symbol, constraints = ?c, "Instrument constraints recovered, sizing enabled");
                self.evaluator.set_constraints(Some(c));
            }
            Ok(c) => {
                tracing::debug!(symbol = %symbol, constraints = ?c, "Instrument constraints still unusable");
            }
            Err(e) => {
                tracing::debug!(symbol = %symbol, error = %e, "Instrument constraints still unavailable");
            }
        }
    }

    /// Current constraints, if sizing is enabled
    pub fn constraints(&self) -> Option<&SizingConstraints> {
        self.evaluator.constraints()
    }

    /// Decide and act on the latest bar of `snapshot`
    ///
    /// Any error leaves the position belief as it was before the call.
    pub async fn evaluate(
        &mut self,
        snapshot: &MarketSnapshot,
        prediction: Prediction,
    ) -> Result<Evaluation, EngineError> {
        if !self.evaluator.sizing_enabled() {
            self.refetch_constraints().await;
        }

        let outcome = self
            .evaluator
            .evaluate(snapshot, prediction, &mut self.tracker, &self.gateway)
            .await?;

        tracing::debug!(outcome = ?outcome, position = ?self.tracker.current(), "Evaluation finished");
        Ok(outcome)
    }
}
