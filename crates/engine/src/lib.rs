pub mod binance;
pub mod dispatcher;
pub mod lifecycle;

pub use binance::{BinanceClient, BinanceFeed};
pub use dispatcher::Dispatcher;
pub use lifecycle::{Engine, EngineHandle};
