// Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use atr_trader::error::GatewayError;
use atr_trader::indicators::{annotate, IndicatorPeriods};
use atr_trader::{
    AccountState, Bar, ExchangeGateway, MarketSnapshot, OrderAck, OrderIntent, SizingConstraints,
};
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Annotated snapshot of flat bars with a true range of `2 * half_range`
///
/// ATR(14) of such a series equals the true range exactly.
pub fn flat_snapshot(close: f64, half_range: f64) -> MarketSnapshot {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let bars = (0..30)
        .map(|i| Bar {
            timestamp: start + Duration::minutes(15 * i),
            open: close,
            high: close + half_range,
            low: close - half_range,
            close,
            volume: 1.0,
        })
        .collect();
    annotate(
        MarketSnapshot::from_bars("BTC", Duration::minutes(15), bars),
        IndicatorPeriods::default(),
    )
}

pub fn btc_constraints() -> SizingConstraints {
    SizingConstraints {
        min_order_size: 0.0001,
        size_step: 0.0001,
        tick_size: 1.0,
    }
}

#[derive(Default)]
struct State {
    balances: HashMap<String, f64>,
    fail_balance: bool,
    cancels: usize,
    orders: Vec<OrderIntent>,
}

/// In-memory exchange that records every cancel and order
pub struct MockExchange {
    state: Mutex<State>,
    constraints: SizingConstraints,
}

impl MockExchange {
    pub fn new(balances: &[(&str, f64)]) -> Self {
        Self {
            state: Mutex::new(State {
                balances: balances.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                ..Default::default()
            }),
            constraints: btc_constraints(),
        }
    }

    pub fn set_balance(&self, asset: &str, amount: f64) {
        self.state.lock().unwrap().balances.insert(asset.to_string(), amount);
    }

    pub fn fail_balance(&self, fail: bool) {
        self.state.lock().unwrap().fail_balance = fail;
    }

    pub fn cancels(&self) -> usize {
        self.state.lock().unwrap().cancels
    }

    pub fn orders(&self) -> Vec<OrderIntent> {
        self.state.lock().unwrap().orders.clone()
    }
}

#[async_trait]
impl ExchangeGateway for MockExchange {
    async fn fetch_balance(&self) -> Result<AccountState, GatewayError> {
        let state = self.state.lock().unwrap();
        if state.fail_balance {
            return Err(GatewayError::Api {
                status: 5,
                message: "Maintenance".to_string(),
            });
        }
        Ok(AccountState::new(state.balances.clone()))
    }

    async fn fetch_instrument_constraints(
        &self,
        _symbol: &str,
    ) -> Result<SizingConstraints, GatewayError> {
        Ok(self.constraints)
    }

    async fn cancel_all_orders(&self, _symbol: &str) -> Result<usize, GatewayError> {
        self.state.lock().unwrap().cancels += 1;
        Ok(0)
    }

    async fn submit_limit_order(&self, intent: &OrderIntent) -> Result<OrderAck, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.orders.push(intent.clone());
        Ok(OrderAck {
            order_id: state.orders.len().to_string(),
        })
    }
}
