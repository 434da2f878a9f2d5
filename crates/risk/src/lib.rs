pub mod position;
pub mod sizing;
pub mod stats;

pub use position::{OpenPosition, PositionManager, TradeRecord};
pub use sizing::{round_price, round_quantity, SizingPolicy};
pub use stats::{Stats, StatsTracker};
