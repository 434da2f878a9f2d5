use tokio::sync::watch;
use tracing::{debug, info, warn};

use common::{Candle, Direction, ExitReason, MarketEvent, PositionSide, PriceTick};
use risk::{PositionManager, Stats, TradeRecord};
use strategy::{Action, CandleStore, IndicatorEngine, SignalGenerator, Strategy};

/// Routes market events to the candle store, the strategy and the position
/// manager, in arrival order.
///
/// Owned by the engine task, which is the only writer of any of this state.
pub struct Dispatcher {
    store: CandleStore,
    generator: SignalGenerator,
    positions: PositionManager,
    current_price: Option<f64>,
    price_tx: watch::Sender<Option<f64>>,
    accepting_entries: bool,
}

impl Dispatcher {
    pub fn new(
        store: CandleStore,
        generator: SignalGenerator,
        positions: PositionManager,
        price_tx: watch::Sender<Option<f64>>,
    ) -> Self {
        Self {
            store,
            generator,
            positions,
            current_price: None,
            price_tx,
            accepting_entries: true,
        }
    }

    pub fn store(&self) -> &CandleStore {
        &self.store
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    pub fn current_price(&self) -> Option<f64> {
        self.current_price
    }

    pub fn stats(&self) -> Stats {
        self.positions.stats().snapshot()
    }

    pub async fn handle(&mut self, event: MarketEvent) {
        match event {
            MarketEvent::PriceTick(tick) => self.on_tick(tick).await,
            MarketEvent::CandleClosed(candle) => self.on_candle(candle).await,
        }
    }

    async fn on_tick(&mut self, tick: PriceTick) {
        if !tick.price.is_finite() || tick.price <= 0.0 {
            warn!(price = tick.price, "Ignoring invalid tick");
            return;
        }
        self.set_price(tick.price);

        if let Some(trade) = self.positions.on_tick(tick.price).await {
            debug!(reason = %trade.reason, pnl = trade.pnl, "Tick closed position");
        }
    }

    async fn on_candle(&mut self, candle: Candle) {
        if let Err(e) = self.store.append(candle) {
            warn!(error = %e, "Dropping candle");
            return;
        }

        // Until the first trade arrives, the last close is the best reference.
        if self.current_price.is_none() && candle.close.is_finite() && candle.close > 0.0 {
            self.set_price(candle.close);
        }

        let action = {
            let indicators = IndicatorEngine::new(&self.store);
            self.generator.evaluate(&indicators, self.positions.side())
        };
        self.apply(action).await;
        self.log_status();
    }

    async fn apply(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::Enter(direction) => self.enter(direction).await,
            Action::Exit => {
                if self.positions.side() != PositionSide::Flat {
                    let _ = self.positions.close(ExitReason::StrategySignal).await;
                }
            }
        }
    }

    async fn enter(&mut self, direction: Direction) {
        if !self.accepting_entries {
            debug!(%direction, "Entry signal ignored while stopping");
            return;
        }
        if self.positions.side() == PositionSide::from(direction.opposite())
            && self.positions.close(ExitReason::StrategySignal).await.is_err()
        {
            // Still holding the opposite side; try again on the next signal.
            return;
        }

        if self.positions.side() != PositionSide::Flat {
            return;
        }
        let _ = self.positions.open(direction, self.current_price).await;
    }

    /// Close the open position at market with reason "Manual".
    pub async fn close_manual(&mut self) -> Option<TradeRecord> {
        if self.positions.side() == PositionSide::Flat {
            info!("Manual close requested but no position is open");
            return None;
        }
        self.positions.close(ExitReason::Manual).await.ok()
    }

    /// Stop taking entries and flatten any open position.
    pub async fn shutdown(&mut self) -> Option<TradeRecord> {
        self.accepting_entries = false;
        if self.positions.side() == PositionSide::Flat {
            return None;
        }
        info!("Closing open position before shutdown");
        self.positions.close(ExitReason::Shutdown).await.ok()
    }

    fn set_price(&mut self, price: f64) {
        self.current_price = Some(price);
        self.price_tx.send_replace(Some(price));
    }

    fn log_status(&self) {
        let stats = self.positions.stats();
        let position = self.positions.position();
        info!(
            symbol = %self.positions.symbol(),
            strategy = %self.generator.name(),
            price = self.current_price.unwrap_or_default(),
            candles = self.store.len(),
            position = %self.positions.side(),
            entry_price = position.map(|p| p.entry_price),
            unrealized_pct = position.map(|p| p.unrealized_pnl_pct * 100.0),
            total_trades = stats.total_trades(),
            win_rate_pct = stats.win_rate() * 100.0,
            total_pnl = stats.total_pnl(),
            "Status"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use common::{OrderSide, RiskParameters, SizingMode, SymbolIncrements};
    use paper::PaperGateway;
    use risk::SizingPolicy;
    use strategy::MaCrossStrategy;

    fn candle(minute: i64, close: f64) -> Candle {
        Candle {
            open_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(minute),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    fn tick(price: f64) -> MarketEvent {
        MarketEvent::PriceTick(PriceTick {
            price,
            timestamp: Utc::now(),
        })
    }

    /// MA cross 2/3 seeded flat at 10, trading 1 unit on a paper gateway.
    fn dispatcher() -> (Dispatcher, Arc<PaperGateway>) {
        let (price_tx, price_rx) = watch::channel(None);
        let gateway = Arc::new(PaperGateway::new("BTCUSDT", price_rx, 0.0));
        let sizing = SizingPolicy::new(
            SizingMode::FixedLot { quantity: 1.0 },
            SymbolIncrements {
                tick_size: 0.01,
                step_size: 0.001,
                min_notional: 10.0,
            },
        );
        let positions =
            PositionManager::new(gateway.clone(), "BTCUSDT", sizing, RiskParameters::default());

        let mut store = CandleStore::new(50);
        store.seed((0..3).map(|i| candle(i, 10.0)));

        let generator = SignalGenerator::MaCross(MaCrossStrategy::new(2, 3));
        (Dispatcher::new(store, generator, positions, price_tx), gateway)
    }

    #[tokio::test]
    async fn cross_up_enters_long_at_candle_close() {
        let (mut d, gateway) = dispatcher();

        d.handle(MarketEvent::CandleClosed(candle(3, 13.0))).await;

        assert_eq!(d.current_price(), Some(13.0));
        assert_eq!(d.positions().side(), PositionSide::Long);
        assert_eq!(d.positions().position().unwrap().entry_price, 13.0);
        assert_eq!(d.stats().total_trades, 1);
        assert_eq!(gateway.fills().await.len(), 1);
    }

    #[tokio::test]
    async fn ticks_never_evaluate_the_strategy() {
        let (mut d, gateway) = dispatcher();
        d.handle(tick(500.0)).await;
        d.handle(tick(1.0)).await;

        assert_eq!(d.store().len(), 3);
        assert_eq!(d.positions().side(), PositionSide::Flat);
        assert!(gateway.fills().await.is_empty());
        assert_eq!(d.current_price(), Some(1.0));
    }

    #[tokio::test]
    async fn tick_price_wins_over_candle_close() {
        let (mut d, _gateway) = dispatcher();
        d.handle(tick(12.5)).await;
        d.handle(MarketEvent::CandleClosed(candle(3, 13.0))).await;

        assert_eq!(d.current_price(), Some(12.5));
        assert_eq!(d.positions().position().unwrap().entry_price, 12.5);
    }

    #[tokio::test]
    async fn tick_hits_stop_loss() {
        let (mut d, gateway) = dispatcher();
        d.handle(tick(13.0)).await;
        d.handle(MarketEvent::CandleClosed(candle(3, 13.0))).await;
        assert_eq!(d.positions().side(), PositionSide::Long);

        d.handle(tick(12.0)).await;
        assert_eq!(d.positions().side(), PositionSide::Flat);
        let fills = gateway.fills().await;
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[1].side, OrderSide::Sell);
        assert!(d.stats().total_pnl < 0.0);
    }

    #[tokio::test]
    async fn cross_down_exits_long() {
        let (mut d, gateway) = dispatcher();
        d.handle(MarketEvent::CandleClosed(candle(3, 13.0))).await;
        // Inside the stop band: 13 * 0.98 = 12.74
        d.handle(tick(12.8)).await;
        assert_eq!(d.positions().side(), PositionSide::Long);

        // fast 12.9 > slow 11.93
        d.handle(MarketEvent::CandleClosed(candle(4, 12.8))).await;
        assert_eq!(d.positions().side(), PositionSide::Long);

        // fast 12.775 < slow 12.85
        d.handle(MarketEvent::CandleClosed(candle(5, 12.75))).await;
        assert_eq!(d.positions().side(), PositionSide::Flat);
        let fills = gateway.fills().await;
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[1].side, OrderSide::Sell);
        assert_eq!(fills[1].avg_fill_price, 12.8);
    }

    #[tokio::test]
    async fn out_of_order_candle_is_dropped() {
        let (mut d, gateway) = dispatcher();
        d.handle(MarketEvent::CandleClosed(candle(1, 50.0))).await;

        assert_eq!(d.store().len(), 3);
        assert_eq!(d.current_price(), None);
        assert!(gateway.fills().await.is_empty());
    }

    #[tokio::test]
    async fn enter_closes_opposite_position_first() {
        let (mut d, gateway) = dispatcher();
        d.handle(tick(10.0)).await;
        d.positions.open(Direction::Short, Some(10.0)).await.unwrap();

        d.apply(Action::Enter(Direction::Long)).await;

        assert_eq!(d.positions().side(), PositionSide::Long);
        let fills = gateway.fills().await;
        let sides: Vec<_> = fills.iter().map(|f| f.side).collect();
        assert_eq!(sides, vec![OrderSide::Sell, OrderSide::Buy, OrderSide::Buy]);
        assert_eq!(d.stats().total_trades, 2);
    }

    #[tokio::test]
    async fn shutdown_flattens_and_blocks_entries() {
        let (mut d, gateway) = dispatcher();
        d.handle(MarketEvent::CandleClosed(candle(3, 13.0))).await;

        let trade = d.shutdown().await.unwrap();
        assert_eq!(trade.reason, ExitReason::Shutdown);
        assert_eq!(d.positions().side(), PositionSide::Flat);

        d.apply(Action::Enter(Direction::Long)).await;
        assert_eq!(d.positions().side(), PositionSide::Flat);
        assert_eq!(gateway.fills().await.len(), 2);
    }

    #[tokio::test]
    async fn entry_while_stopping_leaves_opposite_position_alone() {
        let (mut d, gateway) = dispatcher();
        d.handle(tick(10.0)).await;
        d.positions.open(Direction::Short, Some(10.0)).await.unwrap();
        d.accepting_entries = false;

        d.apply(Action::Enter(Direction::Long)).await;

        assert_eq!(d.positions().side(), PositionSide::Short);
        assert_eq!(gateway.fills().await.len(), 1);
    }

    #[tokio::test]
    async fn manual_close_when_flat_is_a_no_op() {
        let (mut d, gateway) = dispatcher();
        assert!(d.close_manual().await.is_none());
        assert!(gateway.fills().await.is_empty());
    }
}
