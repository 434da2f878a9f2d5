pub mod config;
pub mod error;
pub mod exchange;
pub mod types;

pub use config::{Config, MarketMode};
pub use error::{Error, Result};
pub use exchange::{ExecutionGateway, MarketFeed, SymbolInfo};
pub use types::*;
