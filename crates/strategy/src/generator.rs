use tracing::debug;

use common::{Direction, PositionSide};

use crate::config::StrategyKind;
use crate::{Action, IndicatorEngine, Strategy};

/// The closed set of strategies the engine can run.
///
/// Built once from configuration; every variant satisfies the same
/// `Strategy::evaluate` contract.
#[derive(Debug, Clone)]
pub enum SignalGenerator {
    MaCross(MaCrossStrategy),
    Rsi(RsiStrategy),
}

impl SignalGenerator {
    pub fn from_kind(kind: &StrategyKind) -> Self {
        match *kind {
            StrategyKind::MaCross {
                fast_period,
                slow_period,
            } => SignalGenerator::MaCross(MaCrossStrategy::new(fast_period, slow_period)),
            StrategyKind::Rsi {
                period,
                oversold,
                overbought,
            } => SignalGenerator::Rsi(RsiStrategy::new(period, oversold, overbought)),
        }
    }

    fn inner(&self) -> &dyn Strategy {
        match self {
            SignalGenerator::MaCross(s) => s as &dyn Strategy,
            SignalGenerator::Rsi(s) => s as &dyn Strategy,
        }
    }
}

impl Strategy for SignalGenerator {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn warmup(&self) -> usize {
        self.inner().warmup()
    }

    fn evaluate(&self, indicators: &IndicatorEngine<'_>, side: PositionSide) -> Action {
        self.inner().evaluate(indicators, side)
    }
}

// ─── Concrete strategy types ──────────────────────────────────────────────────

/// Long-only moving average cross.
///
/// Enters long while the fast SMA is above the slow SMA and exits a long once
/// it drops below. It never opens a short.
#[derive(Debug, Clone)]
pub struct MaCrossStrategy {
    name: String,
    pub fast_period: usize,
    pub slow_period: usize,
}

impl MaCrossStrategy {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            name: format!("MA cross {fast_period}/{slow_period}"),
            fast_period,
            slow_period,
        }
    }
}

impl Strategy for MaCrossStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup(&self) -> usize {
        self.fast_period.max(self.slow_period)
    }

    fn evaluate(&self, indicators: &IndicatorEngine<'_>, side: PositionSide) -> Action {
        let (Some(fast), Some(slow)) = (
            indicators.sma(self.fast_period),
            indicators.sma(self.slow_period),
        ) else {
            return Action::None;
        };

        debug!(
            fast_period = self.fast_period,
            slow_period = self.slow_period,
            fast,
            slow,
            "MA cross evaluated"
        );

        if fast > slow && side != PositionSide::Long {
            Action::Enter(Direction::Long)
        } else if fast < slow && side == PositionSide::Long {
            Action::Exit
        } else {
            Action::None
        }
    }
}

/// RSI mean reversion: buy oversold, sell an open long once overbought.
#[derive(Debug, Clone)]
pub struct RsiStrategy {
    name: String,
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl RsiStrategy {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Self {
        Self {
            name: format!("RSI {period}"),
            period,
            oversold,
            overbought,
        }
    }
}

impl Strategy for RsiStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup(&self) -> usize {
        self.period + 1
    }

    fn evaluate(&self, indicators: &IndicatorEngine<'_>, side: PositionSide) -> Action {
        let Some(rsi) = indicators.rsi(self.period) else {
            return Action::None;
        };

        debug!(period = self.period, rsi, "RSI evaluated");

        if rsi < self.oversold && side != PositionSide::Long {
            Action::Enter(Direction::Long)
        } else if rsi > self.overbought && side == PositionSide::Long {
            Action::Exit
        } else {
            Action::None
        }
    }
}
