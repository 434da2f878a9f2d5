use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use common::{Error, ExecutionGateway, Order, OrderResult, OrderSide, Result};

/// Simulated execution gateway for paper trading.
///
/// Market orders fill in full at the latest price published on the watch
/// channel, with configurable slippage. Nothing is ever sent to a venue.
pub struct PaperGateway {
    symbol: String,
    /// Latest observed price, published by the engine's dispatcher.
    price_rx: watch::Receiver<Option<f64>>,
    /// Slippage in basis points applied to all fills.
    slippage_bps: f64,
    fills: Arc<RwLock<Vec<OrderResult>>>,
    /// Signed net quantity: positive long, negative short.
    net_quantity: Arc<RwLock<f64>>,
}

impl PaperGateway {
    pub fn new(
        symbol: impl Into<String>,
        price_rx: watch::Receiver<Option<f64>>,
        slippage_bps: f64,
    ) -> Self {
        let symbol = symbol.into();
        info!(symbol = %symbol, slippage_bps, "PaperGateway initialized");
        Self {
            symbol,
            price_rx,
            slippage_bps,
            fills: Arc::new(RwLock::new(Vec::new())),
            net_quantity: Arc::new(RwLock::new(0.0)),
        }
    }

    /// Every simulated fill so far, oldest first.
    pub async fn fills(&self) -> Vec<OrderResult> {
        self.fills.read().await.clone()
    }

    pub async fn net_quantity(&self) -> f64 {
        *self.net_quantity.read().await
    }
}

#[async_trait]
impl ExecutionGateway for PaperGateway {
    async fn place_order(&self, order: &Order) -> Result<OrderResult> {
        if order.symbol != self.symbol {
            return Err(Error::Exchange(format!(
                "PaperGateway trades '{}' only, got order for '{}'",
                self.symbol, order.symbol
            )));
        }
        if !order.quantity.is_finite() || order.quantity <= 0.0 {
            return Err(Error::InvalidQuantity(format!(
                "paper order quantity {}",
                order.quantity
            )));
        }

        let mid_price = (*self.price_rx.borrow()).ok_or_else(|| {
            Error::Exchange(format!(
                "PaperGateway has no price for '{}'. Ensure market events are flowing.",
                order.symbol
            ))
        })?;

        // Buys pay more, sells receive less
        let slip = self.slippage_bps / 10_000.0;
        let fill_price = match order.side {
            OrderSide::Buy => mid_price * (1.0 + slip),
            OrderSide::Sell => mid_price * (1.0 - slip),
        };

        debug!(
            symbol = %order.symbol,
            side = %order.side,
            mid = mid_price,
            fill = fill_price,
            qty = order.quantity,
            "Paper fill simulated"
        );

        let fill = OrderResult {
            order_id: order.id.clone(),
            side: order.side,
            filled_qty: order.quantity,
            avg_fill_price: fill_price,
            timestamp: Utc::now(),
        };

        {
            let mut net = self.net_quantity.write().await;
            match order.side {
                OrderSide::Buy => *net += order.quantity,
                OrderSide::Sell => *net -= order.quantity,
            }
        }
        self.fills.write().await.push(fill.clone());

        Ok(fill)
    }
}
