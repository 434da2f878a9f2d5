mod rest;
mod stream;

pub use rest::BinanceClient;
pub use stream::BinanceFeed;

const REST_MAINNET: &str = "https://api.binance.com";
const REST_TESTNET: &str = "https://testnet.binance.vision";
const WS_MAINNET: &str = "wss://stream.binance.com:9443";
const WS_TESTNET: &str = "wss://testnet.binance.vision";
