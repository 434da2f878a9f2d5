use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info};

use common::{
    Candle, Error, ExecutionGateway, Order, OrderResult, OrderType, Result, SymbolIncrements,
    SymbolInfo,
};

use super::{REST_MAINNET, REST_TESTNET};

/// Binance rejects kline requests above this limit.
const MAX_KLINES: usize = 1000;

/// Used when the symbol carries no notional filter.
const DEFAULT_MIN_NOTIONAL: f64 = 10.0;

/// REST API client for Binance spot.
///
/// Public endpoints (symbol info, klines) work without credentials; order
/// placement needs an API key and secret.
pub struct BinanceClient {
    base_url: String,
    credentials: Option<(String, String)>,
    http: Client,
}

impl BinanceClient {
    pub fn new(testnet: bool) -> Result<Self> {
        let base_url = if testnet { REST_TESTNET } else { REST_MAINNET };
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            credentials: None,
            http,
        })
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some((api_key.into(), secret.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn sign(secret: &str, query: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| Error::Other(format!("invalid HMAC key: {e}")))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn public_get(&self, path: &str, params: &str) -> Result<String> {
        let url = format!("{}{path}?{params}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    async fn signed_post(&self, path: &str, params: &str) -> Result<String> {
        let (api_key, secret) = self.credentials.as_ref().ok_or_else(|| {
            Error::Config("Binance API key and secret are required to place orders".to_string())
        })?;

        let ts = Utc::now().timestamp_millis();
        let query = format!("{params}&timestamp={ts}");
        let signature = Self::sign(secret, &query)?;
        let body = format!("{query}&signature={signature}");
        let url = format!("{}{path}", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {text}")));
        }
        Ok(text)
    }

    /// Most recent closed klines, oldest first. The still-forming kline is
    /// dropped.
    pub async fn klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let limit = limit.clamp(1, MAX_KLINES);
        let params = format!("symbol={symbol}&interval={interval}&limit={limit}");
        let body = self.public_get("/api/v3/klines", &params).await?;
        let candles = parse_klines(&body, Utc::now())?;
        debug!(symbol, interval, count = candles.len(), "Fetched historical klines");
        Ok(candles)
    }
}

#[async_trait]
impl ExecutionGateway for BinanceClient {
    async fn place_order(&self, order: &Order) -> Result<OrderResult> {
        let mut params = format!(
            "symbol={}&side={}&type={}&quantity={}&newClientOrderId={}&newOrderRespType=FULL",
            order.symbol, order.side, order.order_type, order.quantity, order.id
        );
        if order.order_type == OrderType::Limit {
            let price = order.price.ok_or_else(|| {
                Error::Exchange("limit order without a price".to_string())
            })?;
            params.push_str(&format!("&price={price}&timeInForce=GTC"));
        }

        debug!(symbol = %order.symbol, side = %order.side, client_order_id = %order.id, "Submitting order to Binance");
        let body = self.signed_post("/api/v3/order", &params).await?;
        parse_order_response(order, &body)
    }
}

#[async_trait]
impl SymbolInfo for BinanceClient {
    async fn lookup(&self, symbol: &str) -> Result<SymbolIncrements> {
        let body = self
            .public_get("/api/v3/exchangeInfo", &format!("symbol={symbol}"))
            .await?;
        let increments = parse_symbol_filters(symbol, &body)?;
        info!(
            symbol,
            tick_size = increments.tick_size,
            step_size = increments.step_size,
            min_notional = increments.min_notional,
            "Symbol info loaded"
        );
        Ok(increments)
    }
}

// ─── Response parsing ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    client_order_id: String,
    #[serde(default)]
    transact_time: Option<i64>,
    executed_qty: String,
    #[serde(default)]
    cummulative_quote_qty: Option<String>,
    #[serde(default)]
    fills: Vec<FillDetail>,
}

#[derive(Deserialize)]
struct FillDetail {
    price: String,
    qty: String,
}

#[derive(Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolEntry>,
}

#[derive(Deserialize)]
struct SymbolEntry {
    symbol: String,
    filters: Vec<Value>,
}

fn parse_num(raw: &str, field: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|e| Error::Exchange(format!("bad {field} '{raw}': {e}")))
}

fn millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::Exchange(format!("bad timestamp {ms}")))
}

/// Average fill price is the quantity-weighted mean over the fills, falling
/// back to cumulative quote / executed quantity.
fn parse_order_response(order: &Order, body: &str) -> Result<OrderResult> {
    let resp: OrderResponse = serde_json::from_str(body)?;
    let filled_qty = parse_num(&resp.executed_qty, "executedQty")?;

    let mut notional = 0.0;
    let mut fill_qty = 0.0;
    for fill in &resp.fills {
        let price = parse_num(&fill.price, "fill price")?;
        let qty = parse_num(&fill.qty, "fill qty")?;
        notional += price * qty;
        fill_qty += qty;
    }

    let avg_fill_price = if fill_qty > 0.0 {
        notional / fill_qty
    } else {
        match (&resp.cummulative_quote_qty, filled_qty > 0.0) {
            (Some(quote), true) => parse_num(quote, "cummulativeQuoteQty")? / filled_qty,
            _ => 0.0,
        }
    };

    let timestamp = match resp.transact_time {
        Some(ms) => millis(ms)?,
        None => Utc::now(),
    };

    Ok(OrderResult {
        order_id: resp.client_order_id,
        side: order.side,
        filled_qty,
        avg_fill_price,
        timestamp,
    })
}

fn parse_symbol_filters(symbol: &str, body: &str) -> Result<SymbolIncrements> {
    let info: ExchangeInfo = serde_json::from_str(body)?;
    let entry = info
        .symbols
        .into_iter()
        .find(|s| s.symbol == symbol)
        .ok_or_else(|| Error::Exchange(format!("symbol '{symbol}' not found in exchangeInfo")))?;

    let mut tick_size = None;
    let mut step_size = None;
    let mut min_notional = None;

    for filter in &entry.filters {
        let field = |name: &str| -> Result<Option<f64>> {
            filter
                .get(name)
                .and_then(Value::as_str)
                .map(|raw| parse_num(raw, name))
                .transpose()
        };
        match filter.get("filterType").and_then(Value::as_str) {
            Some("PRICE_FILTER") => tick_size = field("tickSize")?,
            Some("LOT_SIZE") => step_size = field("stepSize")?,
            Some("MIN_NOTIONAL") | Some("NOTIONAL") => {
                if min_notional.is_none() {
                    min_notional = field("minNotional")?;
                }
            }
            _ => {}
        }
    }

    Ok(SymbolIncrements {
        tick_size: tick_size
            .ok_or_else(|| Error::Exchange(format!("{symbol} has no PRICE_FILTER")))?,
        step_size: step_size.ok_or_else(|| Error::Exchange(format!("{symbol} has no LOT_SIZE")))?,
        min_notional: min_notional.unwrap_or(DEFAULT_MIN_NOTIONAL),
    })
}

/// Kline rows are `[openTime, open, high, low, close, volume, closeTime, ...]`.
fn parse_klines(body: &str, now: DateTime<Utc>) -> Result<Vec<Candle>> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)?;
    let now_ms = now.timestamp_millis();

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let int_at = |i: usize| {
            row.get(i)
                .and_then(Value::as_i64)
                .ok_or_else(|| Error::Exchange(format!("kline field {i} is not an integer")))
        };
        let num_at = |i: usize| -> Result<f64> {
            let raw = row
                .get(i)
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Exchange(format!("kline field {i} is not a string")))?;
            parse_num(raw, "kline")
        };

        // Still forming
        if int_at(6)? > now_ms {
            continue;
        }

        candles.push(Candle {
            open_time: millis(int_at(0)?)?,
            open: num_at(1)?,
            high: num_at(2)?,
            low: num_at(3)?,
            close: num_at(4)?,
            volume: num_at(5)?,
        });
    }
    Ok(candles)
}
