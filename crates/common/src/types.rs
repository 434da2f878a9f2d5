use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A closed OHLCV candle. Never mutated once stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Latest traded price. Only the most recent one is kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Event pushed by a `MarketFeed` into the engine.
///
/// Feeds must only emit `CandleClosed` for finalized candles; a still-forming
/// candle never reaches the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    PriceTick(PriceTick),
    CandleClosed(Candle),
}

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

/// An order to be submitted to the venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Client order id. Venues that support it receive this as the
    /// idempotency key for the request.
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    /// `None` for market orders.
    pub price: Option<f64>,
    pub order_type: OrderType,
}

impl Order {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            side,
            quantity,
            price: None,
            order_type: OrderType::Market,
        }
    }
}

/// Fill confirmation returned by the venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub side: OrderSide,
    pub filled_qty: f64,
    pub avg_fill_price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Order side that opens a position in this direction.
    pub fn entry_side(self) -> OrderSide {
        match self {
            Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Sell,
        }
    }

    /// Order side that flattens a position in this direction.
    pub fn exit_side(self) -> OrderSide {
        match self {
            Direction::Long => OrderSide::Sell,
            Direction::Short => OrderSide::Buy,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Current exposure of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    #[default]
    Flat,
    Long,
    Short,
}

impl From<Direction> for PositionSide {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Long => PositionSide::Long,
            Direction::Short => PositionSide::Short,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Flat => write!(f, "FLAT"),
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// Price and quantity increments accepted by the venue for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolIncrements {
    pub tick_size: f64,
    pub step_size: f64,
    pub min_notional: f64,
}

/// Fixed-percentage exit thresholds and the PnL scale of one unit of size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParameters {
    /// Loss on the entry price that closes the position (0.02 = 2%).
    pub stop_loss_pct: f64,
    /// Gain on the entry price that closes the position (0.03 = 3%).
    pub take_profit_pct: f64,
    /// Converts price difference x size into quote currency. 1 for spot.
    pub contract_multiplier: f64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.02,
            take_profit_pct: 0.03,
            contract_multiplier: 1.0,
        }
    }
}

/// How an entry quantity is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SizingMode {
    /// Spend `target_exposure` of quote currency, rounded to the step size.
    Notional { target_exposure: f64 },
    /// Always trade `quantity` lots, whatever the price.
    FixedLot { quantity: f64 },
}

/// Whether the bot is running against the real exchange or simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    StrategySignal,
    Manual,
    Shutdown,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "Stop Loss"),
            ExitReason::TakeProfit => write!(f, "Take Profit"),
            ExitReason::StrategySignal => write!(f, "Strategy signal"),
            ExitReason::Manual => write!(f, "Manual"),
            ExitReason::Shutdown => write!(f, "Bot Stopped"),
        }
    }
}

/// Current state of the trading engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
    Stopping,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
            EngineState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Commands sent to the engine via the command channel.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Close any open position at market with `ExitReason::Manual`.
    ClosePosition,
    /// Stop accepting entries, flatten, and shut the feed down.
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_sides_are_mirrored() {
        assert_eq!(Direction::Long.entry_side(), OrderSide::Buy);
        assert_eq!(Direction::Long.exit_side(), OrderSide::Sell);
        assert_eq!(Direction::Short.entry_side(), OrderSide::Sell);
        assert_eq!(Direction::Short.exit_side(), OrderSide::Buy);
        assert_eq!(Direction::Long.opposite(), Direction::Short);
    }

    #[test]
    fn exit_reason_labels() {
        assert_eq!(ExitReason::Shutdown.to_string(), "Bot Stopped");
        assert_eq!(ExitReason::StrategySignal.to_string(), "Strategy signal");
        assert_eq!(ExitReason::StopLoss.to_string(), "Stop Loss");
    }

    #[test]
    fn market_order_has_no_price_and_unique_id() {
        let a = Order::market("BTCUSDT", OrderSide::Buy, 0.5);
        let b = Order::market("BTCUSDT", OrderSide::Buy, 0.5);
        assert!(a.price.is_none());
        assert_eq!(a.order_type, OrderType::Market);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn sizing_mode_parses_from_tagged_table() {
        let mode: SizingMode =
            serde_json::from_str(r#"{"type":"fixed_lot","quantity":2.0}"#).unwrap();
        assert_eq!(mode, SizingMode::FixedLot { quantity: 2.0 });
    }
}
