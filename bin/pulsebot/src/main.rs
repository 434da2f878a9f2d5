use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, ExecutionGateway, MarketFeed, SymbolInfo, TradingMode};
use engine::{BinanceClient, BinanceFeed, Dispatcher, Engine};
use paper::PaperGateway;
use risk::{PositionManager, SizingPolicy};
use strategy::{CandleStore, SignalGenerator, Strategy, StrategyFileConfig};

/// Upper bound on how long shutdown may take once Ctrl-C is received.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("loading configuration")?;
    let strategy_file = match &cfg.strategy_config_path {
        Some(path) => StrategyFileConfig::load(path)
            .with_context(|| format!("loading strategy config {path}"))?,
        None => StrategyFileConfig::from_name(&cfg.strategy)?,
    };

    let mut risk_params = strategy_file.risk;
    // An explicit CONTRACT_MULTIPLIER overrides the file.
    if cfg.contract_multiplier != 1.0 {
        risk_params.contract_multiplier = cfg.contract_multiplier;
    }

    let generator = SignalGenerator::from_kind(&strategy_file.strategy);
    info!(
        mode = %cfg.trading_mode,
        symbol = %cfg.symbol,
        market = %cfg.market_mode,
        strategy = %generator.name(),
        stop_loss_pct = risk_params.stop_loss_pct,
        take_profit_pct = risk_params.take_profit_pct,
        "PulseBot starting"
    );

    // ── Exchange ──────────────────────────────────────────────────────────────
    let mut client = BinanceClient::new(cfg.binance_testnet)?;
    if let (Some(key), Some(secret)) = (&cfg.binance_api_key, &cfg.binance_secret) {
        client = client.with_credentials(key, secret);
    }
    let client = Arc::new(client);

    let increments = client
        .lookup(&cfg.symbol)
        .await
        .with_context(|| format!("looking up symbol info for {}", cfg.symbol))?;
    let sizing = SizingPolicy::new(cfg.sizing, increments);

    // The dispatcher publishes the latest price here; the paper gateway fills at it.
    let (price_tx, price_rx) = watch::channel(None);

    let gateway: Arc<dyn ExecutionGateway> = match cfg.trading_mode {
        TradingMode::Live => {
            info!("Live trading mode, orders go to Binance");
            client.clone()
        }
        TradingMode::Paper => {
            info!(slippage_bps = cfg.paper_slippage_bps, "Paper trading mode, orders are simulated");
            Arc::new(PaperGateway::new(&cfg.symbol, price_rx, cfg.paper_slippage_bps))
        }
    };

    // ── Market data ───────────────────────────────────────────────────────────
    let feed = Arc::new(BinanceFeed::new(
        client.clone(),
        cfg.binance_testnet,
        cfg.kline_interval.clone(),
    ));

    let mut store = CandleStore::new(cfg.candle_capacity);
    match feed.historical_candles(&cfg.symbol, cfg.candle_capacity).await {
        Ok(history) => {
            let loaded = store.seed(history);
            info!(loaded, "Historical candles loaded");
        }
        Err(e) => warn!(error = %e, "Could not load historical candles, starting empty"),
    }
    if store.len() < generator.warmup() {
        warn!(
            have = store.len(),
            need = generator.warmup(),
            "Not enough history for the strategy yet, signals start after warm-up"
        );
    }

    // ── Engine ────────────────────────────────────────────────────────────────
    let positions = PositionManager::new(gateway, cfg.symbol.clone(), sizing, risk_params);
    let dispatcher = Dispatcher::new(store, generator, positions, price_tx);
    let (engine, handle) = Engine::new(cfg.symbol.clone(), feed, dispatcher);
    let mut engine_task = tokio::spawn(engine.run());

    info!("Bot running. Press Ctrl+C to stop.");

    let stats = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl+C")?;
            info!("Shutdown signal received");
            handle.stop().await;
            tokio::time::timeout(SHUTDOWN_TIMEOUT, engine_task)
                .await
                .context("engine did not stop in time")??
        }
        stats = &mut engine_task => stats?,
    };

    info!(
        total_trades = stats.total_trades,
        winning_trades = stats.winning_trades,
        win_rate_pct = stats.win_rate * 100.0,
        total_pnl = stats.total_pnl,
        "Final statistics"
    );
    Ok(())
}
