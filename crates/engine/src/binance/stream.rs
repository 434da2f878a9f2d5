use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use url::Url;

use common::{Candle, Error, MarketEvent, MarketFeed, PriceTick, Result};

use super::{BinanceClient, WS_MAINNET, WS_TESTNET};

/// Binance market data for one symbol: REST kline history plus a combined
/// trade + kline WebSocket stream.
///
/// The stream connects once. When it closes or errors, `subscribe` returns
/// and the feed is finished.
pub struct BinanceFeed {
    rest: Arc<BinanceClient>,
    ws_base: String,
    interval: String,
}

impl BinanceFeed {
    pub fn new(rest: Arc<BinanceClient>, testnet: bool, interval: impl Into<String>) -> Self {
        let ws_base = if testnet { WS_TESTNET } else { WS_MAINNET };
        Self {
            rest,
            ws_base: ws_base.to_string(),
            interval: interval.into(),
        }
    }

    fn stream_url(&self, symbol: &str) -> Result<Url> {
        let lower = symbol.to_lowercase();
        let url = format!(
            "{}/stream?streams={lower}@trade/{lower}@kline_{}",
            self.ws_base, self.interval
        );
        Url::parse(&url).map_err(|e| Error::WebSocket(e.to_string()))
    }
}

#[async_trait]
impl MarketFeed for BinanceFeed {
    async fn historical_candles(&self, symbol: &str, count: usize) -> Result<Vec<Candle>> {
        self.rest.klines(symbol, &self.interval, count).await
    }

    async fn subscribe(&self, symbol: &str, tx: mpsc::Sender<MarketEvent>) -> Result<()> {
        let url = self.stream_url(symbol)?;
        info!(symbol, url = %url, "Connecting to Binance WebSocket stream");

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;
        info!(symbol, "WebSocket stream connected");

        let (_, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| Error::WebSocket(e.to_string()))?;

            match msg {
                Message::Text(text) => match parse_stream_message(&text) {
                    Ok(Some(event)) => {
                        if tx.send(event).await.is_err() {
                            info!(symbol, "Market channel closed, leaving stream");
                            return Ok(());
                        }
                    }
                    Ok(None) => {} // forming kline or unrelated message
                    Err(e) => {
                        warn!(error = %e, "Failed to parse stream message");
                    }
                },
                Message::Close(frame) => {
                    info!(symbol, ?frame, "WebSocket stream closed by server");
                    break;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

// ─── Binance stream JSON parsing ──────────────────────────────────────────────

#[derive(Deserialize)]
struct CombinedEnvelope {
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct TradeData {
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "T")]
    trade_time_ms: i64,
}

#[derive(Deserialize)]
struct KlineWrapper {
    k: KlineData,
}

#[derive(Deserialize)]
struct KlineData {
    #[serde(rename = "t")]
    open_time_ms: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "x")]
    is_closed: bool,
}

fn num(raw: &str) -> Result<f64> {
    raw.parse()
        .map_err(|e| Error::Feed(format!("bad number '{raw}': {e}")))
}

fn millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::Feed(format!("bad timestamp {ms}")))
}

/// Parse one message from the combined stream (or a raw single-stream
/// payload). Forming klines yield `None`.
fn parse_stream_message(text: &str) -> Result<Option<MarketEvent>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let data = if value.get("data").is_some() {
        serde_json::from_value::<CombinedEnvelope>(value)?.data
    } else {
        value
    };

    match data.get("e").and_then(|v| v.as_str()) {
        Some("trade") => {
            let trade: TradeData = serde_json::from_value(data)?;
            Ok(Some(MarketEvent::PriceTick(PriceTick {
                price: num(&trade.price)?,
                timestamp: millis(trade.trade_time_ms)?,
            })))
        }
        Some("kline") => {
            let k = serde_json::from_value::<KlineWrapper>(data)?.k;
            if !k.is_closed {
                return Ok(None);
            }
            Ok(Some(MarketEvent::CandleClosed(Candle {
                open_time: millis(k.open_time_ms)?,
                open: num(&k.open)?,
                high: num(&k.high)?,
                low: num(&k.low)?,
                close: num(&k.close)?,
                volume: num(&k.volume)?,
            })))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kline_msg(closed: bool) -> String {
        format!(
            r#"{{"stream":"btcusdt@kline_1m","data":{{"e":"kline","E":1700000060001,"s":"BTCUSDT",
            "k":{{"t":1700000000000,"T":1700000059999,"s":"BTCUSDT","i":"1m",
            "o":"100.0","c":"101.5","h":"102.0","l":"99.5","v":"42.0","n":10,"x":{closed},"q":"0"}}}}}}"#
        )
    }

    #[test]
    fn parses_trade_into_tick() {
        let msg = r#"{"stream":"btcusdt@trade","data":{"e":"trade","E":1700000000123,"s":"BTCUSDT",
            "t":12345,"p":"30123.45","q":"0.010","T":1700000000120,"m":true,"M":true}}"#;
        match parse_stream_message(msg).unwrap() {
            Some(MarketEvent::PriceTick(tick)) => {
                assert_eq!(tick.price, 30123.45);
                assert_eq!(tick.timestamp.timestamp_millis(), 1_700_000_000_120);
            }
            other => panic!("expected tick, got {other:?}"),
        }
    }

    #[test]
    fn closed_kline_becomes_candle() {
        match parse_stream_message(&kline_msg(true)).unwrap() {
            Some(MarketEvent::CandleClosed(c)) => {
                assert_eq!(c.open_time.timestamp_millis(), 1_700_000_000_000);
                assert_eq!(c.open, 100.0);
                assert_eq!(c.high, 102.0);
                assert_eq!(c.low, 99.5);
                assert_eq!(c.close, 101.5);
                assert_eq!(c.volume, 42.0);
            }
            other => panic!("expected candle, got {other:?}"),
        }
    }

    #[test]
    fn forming_kline_is_ignored() {
        assert!(parse_stream_message(&kline_msg(false)).unwrap().is_none());
    }

    #[test]
    fn unrelated_and_malformed_messages() {
        assert!(parse_stream_message(r#"{"result":null,"id":1}"#)
            .unwrap()
            .is_none());
        assert!(parse_stream_message("not json").is_err());
        assert!(parse_stream_message(r#"{"e":"trade","p":"abc","T":1}"#).is_err());
    }

    #[test]
    fn stream_url_combines_trade_and_kline() {
        let rest = Arc::new(BinanceClient::new(true).unwrap());
        let feed = BinanceFeed::new(rest, true, "5m");
        let url = feed.stream_url("BTCUSDT").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://testnet.binance.vision/stream?streams=btcusdt@trade/btcusdt@kline_5m"
        );
    }
}
