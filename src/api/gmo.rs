use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::auth::AuthHeaders;
use super::{ExchangeGateway, MarketDataGateway};
use crate::error::GatewayError;
use crate::models::{
    AccountState, Bar, MarketSnapshot, OrderAck, OrderIntent, RestingOrder, Side,
    SizingConstraints,
};

pub const GMO_PUBLIC_URL: &str = "https://api.coin.z.com/public";
pub const GMO_PRIVATE_URL: &str = "https://api.coin.z.com/private";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const SIZE_DECIMALS: u32 = 8;
const STATUS_MAINTENANCE: i64 = 5;

// Kline files are keyed by Japanese calendar date
const JST_OFFSET_HOURS: i64 = 9;

type GmoRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Connection settings for GMO Coin
///
/// Credentials are never read from the config file; they are filled in
/// from the environment by the config loader.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GmoConfig {
    pub public_url: String,
    pub private_url: String,
    #[serde(skip)]
    pub api_key: String,
    #[serde(skip)]
    pub secret_key: String,
    pub requests_per_second: u32,
    /// Minimum number of JST calendar days of klines to request
    pub lookback_days: u32,
}

impl Default for GmoConfig {
    fn default() -> Self {
        Self {
            public_url: GMO_PUBLIC_URL.to_string(),
            private_url: GMO_PRIVATE_URL.to_string(),
            api_key: String::new(),
            secret_key: String::new(),
            requests_per_second: 5,
            lookback_days: 2,
        }
    }
}

impl fmt::Debug for GmoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GmoConfig")
            .field("public_url", &self.public_url)
            .field("private_url", &self.private_url)
            .field("api_key", &redact(&self.api_key))
            .field("secret_key", &redact(&self.secret_key))
            .field("requests_per_second", &self.requests_per_second)
            .field("lookback_days", &self.lookback_days)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: i64,
    data: Option<T>,
    #[serde(default)]
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message_code: String,
    #[serde(default)]
    message_string: String,
}

impl<T> Envelope<T> {
    fn describe_messages(&self) -> String {
        if self.messages.is_empty() {
            return "no error message".to_string();
        }
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.message_code, m.message_string))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolRaw {
    symbol: String,
    min_order_size: String,
    size_step: String,
    tick_size: String,
}

#[derive(Debug, Deserialize)]
struct AssetRaw {
    symbol: String,
    available: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KlineRaw {
    open_time: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

#[derive(Debug, Default, Deserialize)]
struct ActiveOrdersData {
    #[serde(default)]
    list: Vec<ActiveOrderRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveOrderRaw {
    order_id: Value,
    side: String,
    price: String,
    size: String,
    #[serde(default)]
    executed_size: Option<String>,
}

fn parse_number(field: &str, value: &str) -> Result<f64, GatewayError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| GatewayError::InvalidResponse(format!("{}: {:?} is not a number", field, value)))
}

fn id_to_string(value: &Value) -> Result<String, GatewayError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(GatewayError::InvalidResponse(format!(
            "unexpected order id: {}",
            other
        ))),
    }
}

impl TryFrom<SymbolRaw> for SizingConstraints {
    type Error = GatewayError;

    fn try_from(raw: SymbolRaw) -> Result<Self, Self::Error> {
        Ok(SizingConstraints {
            min_order_size: parse_number("minOrderSize", &raw.min_order_size)?,
            size_step: parse_number("sizeStep", &raw.size_step)?,
            tick_size: parse_number("tickSize", &raw.tick_size)?,
        })
    }
}

impl TryFrom<KlineRaw> for Bar {
    type Error = GatewayError;

    fn try_from(raw: KlineRaw) -> Result<Self, Self::Error> {
        let millis: i64 = raw.open_time.trim().parse().map_err(|_| {
            GatewayError::InvalidResponse(format!("openTime: {:?} is not a number", raw.open_time))
        })?;
        let timestamp = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            GatewayError::InvalidResponse(format!("openTime out of range: {}", millis))
        })?;
        Ok(Bar {
            timestamp,
            open: parse_number("open", &raw.open)?,
            high: parse_number("high", &raw.high)?,
            low: parse_number("low", &raw.low)?,
            close: parse_number("close", &raw.close)?,
            volume: parse_number("volume", &raw.volume)?,
        })
    }
}

impl TryFrom<ActiveOrderRaw> for RestingOrder {
    type Error = GatewayError;

    fn try_from(raw: ActiveOrderRaw) -> Result<Self, Self::Error> {
        let side = Side::from_str(&raw.side)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let size = parse_number("size", &raw.size)?;
        let executed = match raw.executed_size.as_deref() {
            Some(s) => parse_number("executedSize", s)?,
            None => 0.0,
        };
        Ok(RestingOrder {
            order_id: id_to_string(&raw.order_id)?,
            side,
            price: parse_number("price", &raw.price)?,
            size: (size - executed).max(0.0),
        })
    }
}

// ============== Formatting Helpers ==============

/// Price string truncated to the instrument's tick precision
pub(crate) fn format_price(price: f64, tick_size: f64) -> Result<String, GatewayError> {
    let value = Decimal::from_f64(price)
        .ok_or_else(|| GatewayError::InvalidResponse(format!("price not representable: {}", price)))?;
    let scale = Decimal::from_f64(tick_size)
        .map(|t| t.normalize().scale())
        .unwrap_or(0);
    Ok(value
        .round_dp_with_strategy(scale, RoundingStrategy::ToZero)
        .normalize()
        .to_string())
}

pub(crate) fn format_size(amount: f64) -> Result<String, GatewayError> {
    let value = Decimal::from_f64(amount)
        .ok_or_else(|| GatewayError::InvalidResponse(format!("size not representable: {}", amount)))?;
    Ok(value
        .round_dp_with_strategy(SIZE_DECIMALS, RoundingStrategy::ToZero)
        .normalize()
        .to_string())
}

/// GMO name for a bar interval; only intraday intervals keyed by day are supported
fn interval_name(interval: Duration) -> Result<&'static str, GatewayError> {
    let minutes = interval.num_minutes();
    if Duration::minutes(minutes) != interval {
        return Err(GatewayError::UnsupportedInterval(minutes));
    }
    match minutes {
        1 => Ok("1min"),
        5 => Ok("5min"),
        10 => Ok("10min"),
        15 => Ok("15min"),
        30 => Ok("30min"),
        60 => Ok("1hour"),
        other => Err(GatewayError::UnsupportedInterval(other)),
    }
}

/// JST dates (YYYYMMDD) covering the last `days` days, oldest first
fn kline_dates(now: DateTime<Utc>, days: u32) -> Vec<String> {
    let jst_now = now + Duration::hours(JST_OFFSET_HOURS);
    (0..i64::from(days.max(1)))
        .rev()
        .map(|back| (jst_now - Duration::days(back)).format("%Y%m%d").to_string())
        .collect()
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let http_status = response.status();
    let text = response.text().await?;

    if !http_status.is_success() {
        return Err(GatewayError::Api {
            status: i64::from(http_status.as_u16()),
            message: text,
        });
    }

    let envelope: Envelope<T> = serde_json::from_str(&text)?;
    if envelope.status != 0 {
        return Err(GatewayError::Api {
            status: envelope.status,
            message: envelope.describe_messages(),
        });
    }

    envelope
        .data
        .ok_or_else(|| GatewayError::InvalidResponse("response has no data field".to_string()))
}

// ============== Implementation ==============

/// GMO Coin spot client
///
/// Cloneable; clones share the rate limiter and the instrument cache.
#[derive(Clone)]
pub struct GmoClient {
    client: Client,
    config: GmoConfig,
    rate_limiter: Arc<GmoRateLimiter>,
    instruments: Arc<RwLock<HashMap<String, SizingConstraints>>>,
}

impl GmoClient {
    pub fn new(config: GmoConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            client,
            config,
            rate_limiter,
            instruments: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &GmoConfig {
        &self.config
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.public_url, path);
        tracing::debug!(url = %url, ?query, "GET public");
        let response = self.client.get(&url).query(query).send().await?;
        read_envelope(response).await
    }

    async fn get_private<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        self.rate_limiter.until_ready().await;

        // Signature covers the path only, never the query string
        let auth = AuthHeaders::generate(&self.config.api_key, &self.config.secret_key, "GET", path, "")?;
        let url = format!("{}{}", self.config.private_url, path);
        tracing::debug!(url = %url, ?query, "GET private");
        let request = auth.apply_to_request(self.client.get(&url).query(query));
        read_envelope(request.send().await?).await
    }

    async fn post_private<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, GatewayError> {
        self.rate_limiter.until_ready().await;

        let body = serde_json::to_string(body)?;
        let auth = AuthHeaders::generate(&self.config.api_key, &self.config.secret_key, "POST", path, &body)?;
        let url = format!("{}{}", self.config.private_url, path);
        tracing::debug!(url = %url, body = %body, "POST private");
        let request = auth.apply_to_request(
            self.client
                .post(&url)
                .header("Content-Type", "application/json")
                .body(body),
        );
        read_envelope(request.send().await?).await
    }

    /// Orders still working for `symbol`, with remaining (unexecuted) size
    pub async fn fetch_active_orders(&self, symbol: &str) -> Result<Vec<RestingOrder>, GatewayError> {
        let data: ActiveOrdersData = self
            .get_private("/v1/activeOrders", &[("symbol", symbol)])
            .await?;
        data.list.into_iter().map(RestingOrder::try_from).collect()
    }

    /// Tick size for `symbol`, from the cache or the symbols endpoint
    async fn tick_size(&self, symbol: &str) -> Result<f64, GatewayError> {
        if let Some(c) = self.instruments.read().await.get(symbol) {
            return Ok(c.tick_size);
        }
        Ok(self.fetch_instrument_constraints(symbol).await?.tick_size)
    }
}

#[async_trait]
impl MarketDataGateway for GmoClient {
    async fn fetch_recent_bars(
        &self,
        symbol: &str,
        interval: Duration,
        lookback: usize,
    ) -> Result<MarketSnapshot, GatewayError> {
        let interval_str = interval_name(interval)?;

        let span_minutes = interval.num_minutes().saturating_mul(lookback as i64);
        let needed_days = u32::try_from(span_minutes / (24 * 60) + 2).unwrap_or(u32::MAX);
        let dates = kline_dates(Utc::now(), needed_days.max(self.config.lookback_days));

        let mut bars = Vec::new();
        for (i, date) in dates.iter().enumerate() {
            let newest = i + 1 == dates.len();
            let query = [("symbol", symbol), ("interval", interval_str), ("date", date.as_str())];
            match self.get_public::<Vec<KlineRaw>>("/v1/klines", &query).await {
                Ok(raw) => {
                    for kline in raw {
                        bars.push(Bar::try_from(kline)?);
                    }
                }
                // Today's file may not exist yet right after the JST day rollover
                Err(GatewayError::Api { status, message }) if newest && status != STATUS_MAINTENANCE => {
                    tracing::warn!(symbol, date = %date, status, message = %message, "No klines for newest date");
                }
                Err(e) => return Err(e),
            }
        }

        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        if bars.len() > lookback {
            bars.drain(..bars.len() - lookback);
        }

        let snapshot = MarketSnapshot::from_bars(symbol, interval, bars);

        tracing::debug!(symbol, bars = snapshot.len(), days = dates.len(), "Fetched klines");
        Ok(snapshot)
    }
}

#[async_trait]
impl ExchangeGateway for GmoClient {
    async fn fetch_balance(&self) -> Result<AccountState, GatewayError> {
        let assets: Vec<AssetRaw> = self.get_private("/v1/account/assets", &[]).await?;

        let mut balances = HashMap::with_capacity(assets.len());
        for asset in assets {
            let available = parse_number("available", &asset.available)?;
            balances.insert(asset.symbol, available);
        }
        Ok(AccountState::new(balances))
    }

    async fn fetch_instrument_constraints(&self, symbol: &str) -> Result<SizingConstraints, GatewayError> {
        let symbols: Vec<SymbolRaw> = self.get_public("/v1/symbols", &[]).await?;

        let raw = symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| GatewayError::UnknownSymbol(symbol.to_string()))?;
        let constraints = SizingConstraints::try_from(raw)?;

        self.instruments
            .write()
            .await
            .insert(symbol.to_string(), constraints);
        Ok(constraints)
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<usize, GatewayError> {
        let cancelled: Vec<Value> = self
            .post_private("/v1/cancelBulkOrder", &json!({ "symbols": [symbol] }))
            .await?;
        Ok(cancelled.len())
    }

    async fn submit_limit_order(&self, intent: &OrderIntent) -> Result<OrderAck, GatewayError> {
        let tick_size = self.tick_size(&intent.symbol).await?;
        let body = json!({
            "symbol": intent.symbol,
            "side": intent.side.as_str().to_uppercase(),
            "executionType": "LIMIT",
            "timeInForce": "FAS",
            "price": format_price(intent.price, tick_size)?,
            "size": format_size(intent.amount)?,
        });

        let order_id: Value = self.post_private("/v1/order", &body).await?;
        Ok(OrderAck {
            order_id: id_to_string(&order_id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> GmoClient {
        GmoClient::new(GmoConfig {
            public_url: server.url(),
            private_url: server.url(),
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            requests_per_second: 100,
            lookback_days: 2,
        })
        .unwrap()
    }

    const SYMBOLS_BODY: &str = r#"{
        "status": 0,
        "data": [
            {"symbol": "ETH", "minOrderSize": "0.01", "maxOrderSize": "10", "sizeStep": "0.01", "tickSize": "1", "takerFee": "0.0005", "makerFee": "-0.0001"},
            {"symbol": "BTC", "minOrderSize": "0.0001", "maxOrderSize": "5", "sizeStep": "0.0001", "tickSize": "1", "takerFee": "0.0005", "makerFee": "-0.0001"}
        ],
        "responsetime": "2024-05-01T00:00:00.000Z"
    }"#;

    #[test]
    fn test_format_price_truncates_to_tick() {
        assert_eq!(format_price(4_982_000.0, 1.0).unwrap(), "4982000");
        assert_eq!(format_price(4_982_000.75, 1.0).unwrap(), "4982000");
        assert_eq!(format_price(123.456, 0.01).unwrap(), "123.45");
    }

    #[test]
    fn test_format_size_is_plain_decimal() {
        assert_eq!(format_size(0.14).unwrap(), "0.14");
        assert_eq!(format_size(1.0).unwrap(), "1");
    }

    #[test]
    fn test_interval_name() {
        assert_eq!(interval_name(Duration::minutes(15)).unwrap(), "15min");
        assert_eq!(interval_name(Duration::hours(1)).unwrap(), "1hour");
        assert!(matches!(
            interval_name(Duration::hours(4)),
            Err(GatewayError::UnsupportedInterval(240))
        ));
    }

    #[test]
    fn test_kline_dates_use_jst_calendar() {
        // 16:00 UTC is already the next day in Tokyo
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 16, 0, 0).unwrap();
        assert_eq!(kline_dates(now, 2), vec!["20240501", "20240502"]);
    }

    #[tokio::test]
    async fn test_fetch_instrument_constraints() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/symbols")
            .with_status(200)
            .with_body(SYMBOLS_BODY)
            .create_async()
            .await;

        let client = client_for(&server);
        let constraints = client.fetch_instrument_constraints("BTC").await.unwrap();

        assert_eq!(constraints.min_order_size, 0.0001);
        assert_eq!(constraints.size_step, 0.0001);
        assert_eq!(constraints.tick_size, 1.0);
        mock.assert_async().await;

        let err = client.fetch_instrument_constraints("XRP").await.unwrap_err();
        assert!(matches!(err, GatewayError::UnknownSymbol(_)));
    }

    #[tokio::test]
    async fn test_fetch_balance_signs_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/account/assets")
            .match_header("API-KEY", "key")
            .match_header("API-SIGN", Matcher::Regex("^[0-9a-f]{64}$".to_string()))
            .match_header("API-TIMESTAMP", Matcher::Regex("^[0-9]+$".to_string()))
            .with_status(200)
            .with_body(
                r#"{"status":0,"data":[
                    {"symbol":"JPY","amount":"1000000","available":"999000","conversionRate":"1"},
                    {"symbol":"BTC","amount":"0.5","available":"0.25","conversionRate":"5000000"}
                ]}"#,
            )
            .create_async()
            .await;

        let account = client_for(&server).fetch_balance().await.unwrap();

        assert_eq!(account.available("JPY"), Some(999_000.0));
        assert_eq!(account.available("BTC"), Some(0.25));
        assert_eq!(account.available("ETH"), None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_status_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/cancelBulkOrder")
            .with_status(200)
            .with_body(r#"{"status":1,"messages":[{"message_code":"ERR-5003","message_string":"Requests are too many."}]}"#)
            .create_async()
            .await;

        let err = client_for(&server).cancel_all_orders("BTC").await.unwrap_err();
        match err {
            GatewayError::Api { status, message } => {
                assert_eq!(status, 1);
                assert!(message.contains("ERR-5003"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_all_orders_counts_cancelled() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/cancelBulkOrder")
            .match_body(Matcher::Json(json!({ "symbols": ["BTC"] })))
            .with_status(200)
            .with_body(r#"{"status":0,"data":[637000,637002]}"#)
            .create_async()
            .await;

        let cancelled = client_for(&server).cancel_all_orders("BTC").await.unwrap();

        assert_eq!(cancelled, 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_limit_order_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/symbols")
            .with_status(200)
            .with_body(SYMBOLS_BODY)
            .create_async()
            .await;
        let order = server
            .mock("POST", "/v1/order")
            .match_body(Matcher::Json(json!({
                "symbol": "BTC",
                "side": "BUY",
                "executionType": "LIMIT",
                "timeInForce": "FAS",
                "price": "4982000",
                "size": "0.14"
            })))
            .with_status(200)
            .with_body(r#"{"status":0,"data":"637000"}"#)
            .create_async()
            .await;

        let intent = OrderIntent::new("BTC", Side::Buy, 4_982_000.0, 0.14).unwrap();
        let ack = client_for(&server).submit_limit_order(&intent).await.unwrap();

        assert_eq!(ack.order_id, "637000");
        order.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_active_orders_remaining_size() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/activeOrders")
            .match_query(Matcher::UrlEncoded("symbol".into(), "BTC".into()))
            .with_status(200)
            .with_body(
                r#"{"status":0,"data":{"pagination":{"currentPage":1,"count":1},"list":[
                    {"orderId":223456789,"symbol":"BTC","side":"SELL","executionType":"LIMIT",
                     "size":"0.5","executedSize":"0.2","price":"5018000","status":"ORDERED"}
                ]}}"#,
            )
            .create_async()
            .await;

        let orders = client_for(&server).fetch_active_orders("BTC").await.unwrap();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, "223456789");
        assert_eq!(orders[0].side, Side::Sell);
        assert_eq!(orders[0].price, 5_018_000.0);
        assert!((orders[0].size - 0.3).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_fetch_active_orders_empty_data() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/activeOrders")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":0,"data":{}}"#)
            .create_async()
            .await;

        let orders = client_for(&server).fetch_active_orders("BTC").await.unwrap();
        assert!(orders.is_empty());
    }

    const ONE_BAR_BODY: &str = r#"{"status":0,"data":[
        {"openTime":"1714521600000","open":"100","high":"110","low":"90","close":"105","volume":"1.5"}
    ]}"#;

    async fn klines_for_date(server: &mut mockito::ServerGuard, date: &str, status: usize, body: &str) -> mockito::Mock {
        server
            .mock("GET", "/v1/klines")
            .match_query(Matcher::UrlEncoded("date".into(), date.into()))
            .with_status(status)
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_missing_newest_day_is_tolerated() {
        let dates = kline_dates(Utc::now(), 2);
        let mut server = mockito::Server::new_async().await;
        klines_for_date(&mut server, &dates[0], 200, ONE_BAR_BODY).await;
        klines_for_date(
            &mut server,
            &dates[1],
            200,
            r#"{"status":1,"messages":[{"message_code":"ERR-5207","message_string":"The date is invalid."}]}"#,
        )
        .await;

        let snapshot = client_for(&server)
            .fetch_recent_bars("BTC", Duration::minutes(15), 10)
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_maintenance_on_newest_day_is_an_error() {
        let dates = kline_dates(Utc::now(), 2);
        let mut server = mockito::Server::new_async().await;
        klines_for_date(&mut server, &dates[0], 200, ONE_BAR_BODY).await;
        klines_for_date(
            &mut server,
            &dates[1],
            200,
            r#"{"status":5,"messages":[{"message_code":"ERR-5201","message_string":"MAINTENANCE."}]}"#,
        )
        .await;

        let err = client_for(&server)
            .fetch_recent_bars("BTC", Duration::minutes(15), 10)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Api { status: 5, .. }));
    }

    #[tokio::test]
    async fn test_older_day_failure_is_an_error() {
        let dates = kline_dates(Utc::now(), 2);
        let mut server = mockito::Server::new_async().await;
        klines_for_date(
            &mut server,
            &dates[0],
            200,
            r#"{"status":1,"messages":[{"message_code":"ERR-5003","message_string":"Requests are too many."}]}"#,
        )
        .await;
        klines_for_date(&mut server, &dates[1], 200, ONE_BAR_BODY).await;

        let err = client_for(&server)
            .fetch_recent_bars("BTC", Duration::minutes(15), 10)
            .await
            .unwrap_err();

        match err {
            GatewayError::Api { status, message } => {
                assert_eq!(status, 1);
                assert!(message.contains("ERR-5003"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_recent_bars_merges_days_and_keeps_lookback() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "BTC".into()),
                Matcher::UrlEncoded("interval".into(), "15min".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"status":0,"data":[
                    {"openTime":"1714521600000","open":"100","high":"110","low":"90","close":"105","volume":"1.5"},
                    {"openTime":"1714522500000","open":"105","high":"112","low":"101","close":"110","volume":"2"},
                    {"openTime":"1714523400000","open":"110","high":"115","low":"108","close":"112","volume":"0.7"}
                ]}"#,
            )
            .expect_at_least(1)
            .create_async()
            .await;

        let snapshot = client_for(&server)
            .fetch_recent_bars("BTC", Duration::minutes(15), 2)
            .await
            .unwrap();

        // Every date returns the same bars; duplicates collapse
        assert_eq!(snapshot.len(), 2);
        let latest = snapshot.latest().unwrap();
        assert_eq!(latest.bar.close, 112.0);
        assert_eq!(latest.bar.timestamp.timestamp_millis(), 1_714_523_400_000);
        assert!(snapshot.gaps().is_empty());
        mock.assert_async().await;
    }
}
