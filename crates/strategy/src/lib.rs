pub mod candles;
pub mod config;
pub mod generator;
pub mod indicators;

pub use candles::CandleStore;
pub use config::{StrategyFileConfig, StrategyKind};
pub use generator::{MaCrossStrategy, RsiStrategy, SignalGenerator};
pub use indicators::IndicatorEngine;

use common::{Direction, PositionSide};

/// What the engine should do after a candle closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Enter(Direction),
    Exit,
}

/// All strategy implementations must satisfy this trait.
///
/// Strategies are stateless: the same indicators and position side always
/// produce the same action.
pub trait Strategy: Send + Sync {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    /// Closed candles needed before the strategy can emit anything.
    fn warmup(&self) -> usize;

    /// Map the current indicators and position side to an action.
    ///
    /// Missing indicator values mean "no signal" and yield `Action::None`.
    fn evaluate(&self, indicators: &IndicatorEngine<'_>, side: PositionSide) -> Action;
}
