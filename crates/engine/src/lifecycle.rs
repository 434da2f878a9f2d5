use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use common::{EngineCommand, EngineState, MarketEvent, MarketFeed};
use risk::Stats;

use crate::dispatcher::Dispatcher;

/// Bound on how long shutdown waits for the feed task to finish.
const FEED_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable handle for controlling a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
}

impl EngineHandle {
    pub async fn send(&self, cmd: EngineCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            warn!("Engine is gone, command dropped");
        }
    }

    pub async fn stop(&self) {
        self.send(EngineCommand::Stop).await;
    }

    pub async fn close_position(&self) {
        self.send(EngineCommand::ClosePosition).await;
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }
}

/// The main engine: owns the dispatcher, runs the feed subscription and
/// processes commands.
pub struct Engine {
    symbol: String,
    feed: Arc<dyn MarketFeed>,
    dispatcher: Dispatcher,
    state: Arc<RwLock<EngineState>>,
    command_rx: mpsc::Receiver<EngineCommand>,
    market_capacity: usize,
}

impl Engine {
    pub fn new(
        symbol: impl Into<String>,
        feed: Arc<dyn MarketFeed>,
        dispatcher: Dispatcher,
    ) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let state = Arc::new(RwLock::new(EngineState::Stopped));

        let handle = EngineHandle {
            command_tx,
            state: state.clone(),
        };

        let engine = Engine {
            symbol: symbol.into(),
            feed,
            dispatcher,
            state,
            command_rx,
            market_capacity: 1024,
        };

        (engine, handle)
    }

    /// Run until `EngineCommand::Stop` (or every handle is dropped), then
    /// flatten and return the final statistics. Call from `tokio::spawn`.
    pub async fn run(mut self) -> Stats {
        *self.state.write().await = EngineState::Running;
        info!(symbol = %self.symbol, "Engine running");

        let (market_tx, mut market_rx) = mpsc::channel::<MarketEvent>(self.market_capacity);
        let feed_task = self.spawn_feed(market_tx);
        let mut feed_open = true;

        loop {
            tokio::select! {
                biased;

                cmd = self.command_rx.recv() => match cmd {
                    Some(EngineCommand::ClosePosition) => {
                        info!("Manual close requested");
                        self.dispatcher.close_manual().await;
                    }
                    Some(EngineCommand::Stop) => {
                        info!("Stop requested");
                        break;
                    }
                    None => {
                        warn!("Engine command channel closed, shutting down");
                        break;
                    }
                },

                event = market_rx.recv(), if feed_open => match event {
                    Some(event) => self.dispatcher.handle(event).await,
                    None => {
                        // Keep serving commands so a stop can still flatten.
                        warn!(symbol = %self.symbol, "Market feed ended, waiting for stop");
                        feed_open = false;
                    }
                },
            }
        }

        self.shutdown(feed_task).await
    }

    fn spawn_feed(&self, tx: mpsc::Sender<MarketEvent>) -> JoinHandle<()> {
        let feed = self.feed.clone();
        let symbol = self.symbol.clone();
        tokio::spawn(async move {
            match feed.subscribe(&symbol, tx).await {
                Ok(()) => info!(symbol = %symbol, "Market feed finished"),
                Err(e) => error!(symbol = %symbol, error = %e, "Market feed failed"),
            }
        })
    }

    async fn shutdown(mut self, feed_task: JoinHandle<()>) -> Stats {
        *self.state.write().await = EngineState::Stopping;

        if self.dispatcher.shutdown().await.is_none()
            && self.dispatcher.positions().position().is_some()
        {
            error!("Failed to close position on shutdown, it remains open at the venue");
        }

        feed_task.abort();
        if tokio::time::timeout(FEED_JOIN_TIMEOUT, feed_task).await.is_err() {
            warn!("Feed task did not finish within the shutdown timeout");
        }

        *self.state.write().await = EngineState::Stopped;

        let stats = self.dispatcher.stats();
        info!(
            total_trades = stats.total_trades,
            winning_trades = stats.winning_trades,
            win_rate_pct = stats.win_rate * 100.0,
            total_pnl = stats.total_pnl,
            "Engine stopped"
        );
        stats
    }
}
