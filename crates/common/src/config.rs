use serde::{Deserialize, Serialize};

use crate::{Error, Result, SizingMode, TradingMode};

/// Venue product type. Drives the default sizing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketMode {
    Spot,
    Futures,
}

impl std::fmt::Display for MarketMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketMode::Spot => write!(f, "spot"),
            MarketMode::Futures => write!(f, "futures"),
        }
    }
}

/// All configuration loaded from environment variables at startup.
/// Immutable for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange
    pub binance_api_key: Option<String>,
    pub binance_secret: Option<String>,
    pub binance_testnet: bool,

    // Trading
    pub trading_mode: TradingMode,
    pub symbol: String,
    pub market_mode: MarketMode,
    pub sizing: SizingMode,
    pub contract_multiplier: f64,
    pub paper_slippage_bps: f64,

    // Market data
    pub kline_interval: String,
    pub candle_capacity: usize,

    // Strategy
    pub strategy: String,
    pub strategy_config_path: Option<String>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let trading_mode = match env.required("TRADING_MODE")?.to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper' or 'live', got: '{other}'"
                )))
            }
        };

        let market_mode = match env
            .optional("MARKET_MODE")
            .unwrap_or_else(|| "spot".to_string())
            .to_lowercase()
            .as_str()
        {
            "spot" => MarketMode::Spot,
            "futures" => MarketMode::Futures,
            other => {
                return Err(Error::Config(format!(
                    "MARKET_MODE must be 'spot' or 'futures', got: '{other}'"
                )))
            }
        };

        let sizing = match market_mode {
            MarketMode::Spot => SizingMode::Notional {
                target_exposure: env.parsed("TRADE_AMOUNT_QUOTE", 100.0)?,
            },
            MarketMode::Futures => SizingMode::FixedLot {
                quantity: env.parsed("FIXED_LOT_QTY", 1.0)?,
            },
        };

        let contract_multiplier: f64 = env.parsed("CONTRACT_MULTIPLIER", 1.0)?;
        if contract_multiplier < 1.0 {
            return Err(Error::Config(format!(
                "CONTRACT_MULTIPLIER must be >= 1, got: {contract_multiplier}"
            )));
        }

        let binance_api_key = env.optional("BINANCE_API_KEY");
        let binance_secret = env.optional("BINANCE_SECRET");
        if trading_mode == TradingMode::Live
            && (binance_api_key.is_none() || binance_secret.is_none())
        {
            return Err(Error::Config(
                "BINANCE_API_KEY and BINANCE_SECRET are required in live mode".to_string(),
            ));
        }

        Ok(Config {
            binance_api_key,
            binance_secret,
            binance_testnet: env.parsed("BINANCE_TESTNET", true)?,
            trading_mode,
            symbol: env
                .optional("SYMBOL")
                .unwrap_or_else(|| "BTCUSDT".to_string())
                .to_uppercase(),
            market_mode,
            sizing,
            contract_multiplier,
            paper_slippage_bps: env.parsed("PAPER_SLIPPAGE_BPS", 10.0)?,
            kline_interval: env
                .optional("KLINE_INTERVAL")
                .unwrap_or_else(|| "1m".to_string()),
            candle_capacity: env.parsed("CANDLE_CAPACITY", 200)?,
            strategy: env
                .optional("STRATEGY")
                .unwrap_or_else(|| "ma_cross".to_string())
                .to_lowercase(),
            strategy_config_path: env.optional("STRATEGY_CONFIG_PATH"),
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn required(&self, key: &str) -> Result<String> {
        self.optional(key).ok_or_else(|| {
            Error::Config(format!(
                "Required environment variable '{key}' is not set. Check your .env file."
            ))
        })
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("{key}='{raw}' is invalid: {e}"))),
            None => Ok(default),
        }
    }
}
