use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Candle, MarketEvent, Order, OrderResult, Result, SymbolIncrements};

/// Places orders on a venue.
///
/// `BinanceClient` implements this for live trading.
/// `PaperGateway` implements this for simulation.
///
/// Only the `PositionManager` in `crates/risk` submits orders; the engine
/// never talks to a gateway directly.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Submit an order and return the fill confirmation.
    async fn place_order(&self, order: &Order) -> Result<OrderResult>;
}

/// Source of market data for one symbol.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Closed candles, oldest first, used to seed the candle store at startup.
    async fn historical_candles(&self, symbol: &str, count: usize) -> Result<Vec<Candle>>;

    /// Push ticks and closed candles into `tx` until the connection ends.
    ///
    /// A subscription is not restartable: once this returns the feed is done.
    async fn subscribe(&self, symbol: &str, tx: mpsc::Sender<MarketEvent>) -> Result<()>;
}

/// One-shot lookup of the exchange increments for a symbol.
#[async_trait]
pub trait SymbolInfo: Send + Sync {
    async fn lookup(&self, symbol: &str) -> Result<SymbolIncrements>;
}
