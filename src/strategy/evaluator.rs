use crate::api::ExchangeGateway;
use crate::error::EngineError;
use crate::execution::position_tracker::{Direction, Position, PositionTracker};
use crate::execution::reconciler::OrderReconciler;
use crate::models::{AccountState, MarketSnapshot, OrderAck, OrderIntent, Prediction, SizingConstraints};

use super::limit_price::{limit_prices, LimitPrices, PriceSnap};
use super::sizing::{floor_to_step, position_size};
use super::{StrategyConfig, TradingMode};

/// Transition chosen for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Open(Direction),
    Close(Direction),
    /// Signal agrees with the held position; leave resting orders alone
    Hold(Direction),
    /// Flat and no signal; cancel resting orders defensively
    Idle,
}

/// Pure decision: the action plus any entry refused because the opposite
/// side is held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub action: Action,
    pub blocked_entry: Option<Direction>,
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// An order was placed and the position belief updated
    Placed {
        action: Action,
        intent: OrderIntent,
        ack: OrderAck,
    },
    Held(Direction),
    Idle { cancelled: usize },
    /// The action fired but no order was sent (zero size, sizing disabled)
    Suppressed { action: Action, reason: String },
    /// Close signal but the exchange reports nothing to close; belief reset
    Flattened(Direction),
    /// Latest bar lacked the inputs needed for a decision
    Skipped { reason: String },
}

impl Evaluation {
    pub fn intent(&self) -> Option<&OrderIntent> {
        match self {
            Evaluation::Placed { intent, .. } => Some(intent),
            _ => None,
        }
    }

    pub fn ack(&self) -> Option<&OrderAck> {
        match self {
            Evaluation::Placed { ack, .. } => Some(ack),
            _ => None,
        }
    }
}

/// ATR limit-order state machine over FLAT/LONG (and FLAT/SHORT in
/// long/short mode)
///
/// Decisions read only the latest bar of the snapshot plus a fresh account
/// state. The position belief lives in the injected [`PositionTracker`] and
/// is committed only after the exchange acknowledged the order.
#[derive(Debug)]
pub struct SignalEvaluator {
    config: StrategyConfig,
    constraints: Option<SizingConstraints>,
    signal_count: u64,
}

impl SignalEvaluator {
    /// `constraints` of `None` (or unusable ones) disables entries
    pub fn new(config: StrategyConfig, constraints: Option<SizingConstraints>) -> Self {
        Self {
            config,
            constraints: constraints.filter(SizingConstraints::is_usable),
            signal_count: 0,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn constraints(&self) -> Option<&SizingConstraints> {
        self.constraints.as_ref()
    }

    pub fn set_constraints(&mut self, constraints: Option<SizingConstraints>) {
        self.constraints = constraints.filter(SizingConstraints::is_usable);
    }

    pub fn sizing_enabled(&self) -> bool {
        self.constraints.is_some()
    }

    /// Threshold crossings seen so far (either direction)
    pub fn signal_count(&self) -> u64 {
        self.signal_count
    }

    fn long_signal(&self, prediction: Prediction) -> bool {
        prediction.value() > self.config.long_threshold
    }

    fn short_signal(&self, prediction: Prediction) -> bool {
        self.config.mode == TradingMode::LongShort
            && prediction.value() < self.config.short_threshold
    }

    /// Decide the transition for `prediction` given the held position
    ///
    /// Comparisons are strict: a prediction equal to a threshold is no signal.
    /// At most one action is returned; when a position is held, the close
    /// wins over any opposite entry, which is reported in `blocked_entry`.
    pub fn plan(&self, prediction: Prediction, position: Option<&Position>) -> Plan {
        let long = self.long_signal(prediction);
        let short = self.short_signal(prediction);

        match position.map(|p| p.side) {
            None => {
                let action = if long {
                    Action::Open(Direction::Long)
                } else if short {
                    Action::Open(Direction::Short)
                } else {
                    Action::Idle
                };
                Plan {
                    action,
                    blocked_entry: None,
                }
            }
            Some(Direction::Long) => Plan {
                action: if long {
                    Action::Hold(Direction::Long)
                } else {
                    Action::Close(Direction::Long)
                },
                blocked_entry: short.then_some(Direction::Short),
            },
            Some(Direction::Short) => Plan {
                action: if short {
                    Action::Hold(Direction::Short)
                } else {
                    Action::Close(Direction::Short)
                },
                blocked_entry: long.then_some(Direction::Long),
            },
        }
    }

    fn price_snap(&self) -> Option<PriceSnap> {
        if !self.config.snap_distance {
            return None;
        }
        self.constraints.map(|c| PriceSnap {
            step: c.size_step,
            min_distance: c.tick_size,
        })
    }

    /// Run one decision against the exchange
    ///
    /// Gateway failures abort the evaluation with the tracker untouched.
    pub async fn evaluate<G: ExchangeGateway + ?Sized>(
        &mut self,
        snapshot: &MarketSnapshot,
        prediction: Prediction,
        tracker: &mut PositionTracker,
        gateway: &G,
    ) -> Result<Evaluation, EngineError> {
        let symbol = self.config.symbol.clone();

        let Some(latest) = snapshot.latest() else {
            tracing::warn!(symbol = %symbol, "Empty snapshot, skipping evaluation");
            return Ok(Evaluation::Skipped {
                reason: "empty snapshot".to_string(),
            });
        };
        let close = latest.bar.close;
        let atr = match latest.atr {
            Some(atr) if atr.is_finite() && atr >= 0.0 && close.is_finite() && close > 0.0 => atr,
            _ => {
                tracing::warn!(
                    symbol = %symbol,
                    close,
                    atr = ?latest.atr,
                    "Latest bar has no usable ATR/close, skipping evaluation"
                );
                return Ok(Evaluation::Skipped {
                    reason: "missing ATR or close on latest bar".to_string(),
                });
            }
        };

        let account = gateway
            .fetch_balance()
            .await
            .map_err(|e| EngineError::gateway("fetch_balance", &symbol, e))?;

        if self.long_signal(prediction) || self.short_signal(prediction) {
            self.signal_count += 1;
        }

        tracing::info!(
            symbol = %symbol,
            prediction = prediction.value(),
            atr,
            close,
            rsi = ?latest.rsi,
            quote_balance = ?account.available(&self.config.quote_asset),
            signal_count = self.signal_count,
            "Evaluating latest bar"
        );

        let plan = self.plan(prediction, tracker.current());
        if let Some(blocked) = plan.blocked_entry {
            tracing::warn!(
                symbol = %symbol,
                held = %blocked.opposite(),
                requested = %blocked,
                "Entry rejected: opposite position is open"
            );
        }

        let prices = limit_prices(close, atr, self.config.atr_ratio, self.price_snap());
        let mut reconciler = OrderReconciler::new(gateway, &symbol);

        match plan.action {
            Action::Open(direction) => {
                self.open(direction, close, &prices, &account, tracker, &mut reconciler)
                    .await
            }
            Action::Close(direction) => {
                self.close(direction, &prices, tracker, gateway, &mut reconciler)
                    .await
            }
            Action::Hold(direction) => {
                tracing::info!(
                    symbol = %symbol,
                    side = %direction,
                    "Already holding position, keeping resting orders"
                );
                Ok(Evaluation::Held(direction))
            }
            Action::Idle => {
                let cancelled = reconciler.clear().await?;
                tracing::info!(symbol = %symbol, "No signal and no position to close");
                Ok(Evaluation::Idle { cancelled })
            }
        }
    }

    async fn open<G: ExchangeGateway + ?Sized>(
        &self,
        direction: Direction,
        current_price: f64,
        prices: &LimitPrices,
        account: &AccountState,
        tracker: &mut PositionTracker,
        reconciler: &mut OrderReconciler<'_, G>,
    ) -> Result<Evaluation, EngineError> {
        let action = Action::Open(direction);
        let symbol = &self.config.symbol;

        let Some(constraints) = self.constraints else {
            tracing::info!(symbol = %symbol, side = %direction, "Sizing disabled, entry suppressed");
            return Ok(Evaluation::Suppressed {
                action,
                reason: "sizing disabled: no usable instrument constraints".to_string(),
            });
        };

        let entry_price = match direction {
            Direction::Long => prices.buy_price,
            Direction::Short => prices.sell_price,
        };
        let size = match account.available(&self.config.quote_asset) {
            Some(balance) => position_size(
                balance,
                current_price,
                self.config.equity_fraction,
                constraints.min_order_size,
                constraints.size_step,
            ),
            None => {
                tracing::error!(
                    symbol = %symbol,
                    asset = %self.config.quote_asset,
                    "Quote balance missing from account state"
                );
                0.0
            }
        };

        if size <= 0.0 {
            return Ok(Evaluation::Suppressed {
                action,
                reason: "computed size is zero".to_string(),
            });
        }

        let intent = OrderIntent::new(symbol.as_str(), direction.entry_side(), entry_price, size)?;
        tracing::info!(
            symbol = %symbol,
            side = %intent.side,
            price = intent.price,
            size = intent.amount,
            "Opening {} position",
            direction
        );

        let ack = reconciler.submit(&intent).await?;
        tracker.open(direction, entry_price, size)?;

        Ok(Evaluation::Placed {
            action,
            intent,
            ack,
        })
    }

    async fn close<G: ExchangeGateway + ?Sized>(
        &self,
        direction: Direction,
        prices: &LimitPrices,
        tracker: &mut PositionTracker,
        gateway: &G,
        reconciler: &mut OrderReconciler<'_, G>,
    ) -> Result<Evaluation, EngineError> {
        let action = Action::Close(direction);
        let symbol = &self.config.symbol;

        let Some(constraints) = self.constraints else {
            tracing::info!(symbol = %symbol, side = %direction, "Sizing disabled, close suppressed");
            return Ok(Evaluation::Suppressed {
                action,
                reason: "sizing disabled: no usable instrument constraints".to_string(),
            });
        };

        // Cancel first so quantity locked in resting orders is released
        reconciler.clear().await?;

        let amount = match direction {
            Direction::Long => {
                let account = gateway
                    .fetch_balance()
                    .await
                    .map_err(|e| EngineError::gateway("fetch_balance", symbol, e))?;
                let held = account.available(&self.config.base_asset).unwrap_or(0.0);
                floor_to_step(held, constraints.size_step)
            }
            Direction::Short => floor_to_step(
                tracker.current().map(|p| p.size).unwrap_or(0.0),
                constraints.size_step,
            ),
        };

        if amount <= 0.0 || amount < constraints.min_order_size {
            tracing::warn!(
                symbol = %symbol,
                side = %direction,
                amount,
                min_order_size = constraints.min_order_size,
                "Nothing tradable to close, resetting position"
            );
            tracker.close();
            return Ok(Evaluation::Flattened(direction));
        }

        let exit_price = match direction {
            Direction::Long => prices.sell_price,
            Direction::Short => prices.buy_price,
        };

        let intent = OrderIntent::new(symbol.as_str(), direction.exit_side(), exit_price, amount)?;
        tracing::info!(
            symbol = %symbol,
            side = %intent.side,
            price = intent.price,
            size = intent.amount,
            "Closing {} position",
            direction
        );

        let ack = reconciler.submit(&intent).await?;
        tracker.close();

        Ok(Evaluation::Placed {
            action,
            intent,
            ack,
        })
    }
}
