//! In-memory exchange used by unit tests

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::api::ExchangeGateway;
use crate::error::GatewayError;
use crate::models::{
    AccountState, Bar, MarketSnapshot, OrderAck, OrderIntent, SizingConstraints,
};

/// Snapshot of three bars whose latest row carries `close` and `atr`
pub(crate) fn snapshot_with(close: f64, atr: f64) -> MarketSnapshot {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let bars = (0..3)
        .map(|i| Bar {
            timestamp: start + Duration::minutes(15 * i),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        })
        .collect();

    let mut snapshot = MarketSnapshot::from_bars("BTC", Duration::minutes(15), bars);
    if let Some(last) = snapshot.rows_mut().last_mut() {
        last.atr = Some(atr);
        last.rsi = Some(50.0);
    }
    snapshot
}

#[derive(Default)]
struct State {
    balances: HashMap<String, f64>,
    constraints: Option<SizingConstraints>,
    fail_balance: bool,
    /// Balance reads beyond this many fail
    balance_limit: Option<usize>,
    fail_cancel: bool,
    fail_submit: bool,
    balance_calls: usize,
    constraint_calls: usize,
    cancel_calls: usize,
    submitted: Vec<OrderIntent>,
}

pub(crate) struct FakeExchange {
    state: Mutex<State>,
}

impl FakeExchange {
    pub(crate) fn with_balances(balances: &[(&str, f64)]) -> Self {
        let state = State {
            balances: balances
                .iter()
                .map(|(asset, qty)| (asset.to_string(), *qty))
                .collect(),
            constraints: Some(SizingConstraints {
                min_order_size: 0.0001,
                size_step: 0.0001,
                tick_size: 1.0,
            }),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub(crate) fn set_constraints(&self, constraints: Option<SizingConstraints>) {
        self.state.lock().unwrap().constraints = constraints;
    }

    pub(crate) fn fail_balance(&self, fail: bool) {
        self.state.lock().unwrap().fail_balance = fail;
    }

    pub(crate) fn fail_balance_after(&self, calls: usize) {
        self.state.lock().unwrap().balance_limit = Some(calls);
    }

    pub(crate) fn fail_cancel(&self, fail: bool) {
        self.state.lock().unwrap().fail_cancel = fail;
    }

    pub(crate) fn fail_submit(&self, fail: bool) {
        self.state.lock().unwrap().fail_submit = fail;
    }

    pub(crate) fn balance_calls(&self) -> usize {
        self.state.lock().unwrap().balance_calls
    }

    pub(crate) fn constraint_calls(&self) -> usize {
        self.state.lock().unwrap().constraint_calls
    }

    pub(crate) fn cancel_calls(&self) -> usize {
        self.state.lock().unwrap().cancel_calls
    }

    pub(crate) fn submitted(&self) -> Vec<OrderIntent> {
        self.state.lock().unwrap().submitted.clone()
    }
}

fn unavailable(what: &str) -> GatewayError {
    GatewayError::Api {
        status: 5,
        message: format!("{what} unavailable"),
    }
}

#[async_trait]
impl ExchangeGateway for FakeExchange {
    async fn fetch_balance(&self) -> Result<AccountState, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.balance_calls += 1;
        let over_limit = state.balance_limit.is_some_and(|limit| state.balance_calls > limit);
        if state.fail_balance || over_limit {
            return Err(unavailable("balance"));
        }
        Ok(AccountState::new(state.balances.clone()))
    }

    async fn fetch_instrument_constraints(
        &self,
        symbol: &str,
    ) -> Result<SizingConstraints, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.constraint_calls += 1;
        state
            .constraints
            .ok_or_else(|| GatewayError::UnknownSymbol(symbol.to_string()))
    }

    async fn cancel_all_orders(&self, _symbol: &str) -> Result<usize, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.cancel_calls += 1;
        if state.fail_cancel {
            return Err(unavailable("cancel"));
        }
        Ok(0)
    }

    async fn submit_limit_order(&self, intent: &OrderIntent) -> Result<OrderAck, GatewayError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_submit {
            return Err(unavailable("order"));
        }
        state.submitted.push(intent.clone());
        Ok(OrderAck {
            order_id: format!("order-{}", state.submitted.len()),
        })
    }
}
