use crate::api::ExchangeGateway;
use crate::error::EngineError;
use crate::models::{OrderAck, OrderIntent};

/// Cancel-all-then-place discipline for one evaluation
///
/// No order ids are kept between evaluations, so stale orders cannot be
/// amended individually; every placement is preceded by a blanket cancel.
/// Created fresh per evaluation and dropped at its end.
pub struct OrderReconciler<'a, G: ExchangeGateway + ?Sized> {
    gateway: &'a G,
    symbol: &'a str,
    cleared: bool,
}

impl<'a, G: ExchangeGateway + ?Sized> OrderReconciler<'a, G> {
    pub fn new(gateway: &'a G, symbol: &'a str) -> Self {
        Self {
            gateway,
            symbol,
            cleared: false,
        }
    }

    /// Whether resting orders were cancelled during this evaluation
    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Cancel every resting order for the symbol. Cancelling zero orders is fine.
    pub async fn clear(&mut self) -> Result<usize, EngineError> {
        let cancelled = self
            .gateway
            .cancel_all_orders(self.symbol)
            .await
            .map_err(|e| EngineError::gateway("cancel_all_orders", self.symbol, e))?;

        tracing::info!(symbol = %self.symbol, cancelled, "Cancelled resting orders");
        self.cleared = true;
        Ok(cancelled)
    }

    /// Make sure the book is clear before `intent` is placed
    ///
    /// Nothing is placed between a clear and the submit within one
    /// evaluation, so a clear earlier in the same evaluation counts.
    pub async fn reconcile_before(&mut self, intent: &OrderIntent) -> Result<(), EngineError> {
        // The cancel only covers this symbol's book
        if intent.symbol != self.symbol {
            return Err(EngineError::SymbolMismatch {
                expected: self.symbol.to_string(),
                got: intent.symbol.clone(),
            });
        }
        if !self.cleared {
            self.clear().await?;
        }
        Ok(())
    }

    /// Reconcile, then place `intent`
    ///
    /// A placement failure after the cancel is surfaced as
    /// [`EngineError::SubmitAfterCancel`]: the book is now empty and the
    /// replacement order did not land.
    pub async fn submit(&mut self, intent: &OrderIntent) -> Result<OrderAck, EngineError> {
        self.reconcile_before(intent).await?;

        match self.gateway.submit_limit_order(intent).await {
            Ok(ack) => {
                tracing::info!(
                    symbol = %intent.symbol,
                    side = %intent.side,
                    price = intent.price,
                    amount = intent.amount,
                    order_id = %ack.order_id,
                    "Limit order placed"
                );
                Ok(ack)
            }
            Err(source) => Err(EngineError::SubmitAfterCancel {
                symbol: intent.symbol.clone(),
                side: intent.side,
                price: intent.price,
                amount: intent.amount,
                source,
            }),
        }
    }
}
