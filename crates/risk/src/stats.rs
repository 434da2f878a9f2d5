use serde::Serialize;

/// Point-in-time copy of the running counters, for status logs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Stats {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub total_pnl: f64,
    pub win_rate: f64,
}

/// Accumulates trade outcomes for the lifetime of the process.
///
/// `total_trades` counts entries, not round trips, so a position that is
/// still open already contributes to it.
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    total_trades: u64,
    winning_trades: u64,
    total_pnl: f64,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_entry(&mut self) {
        self.total_trades += 1;
    }

    /// Record a realized PnL. Break-even counts as a loss.
    pub fn record_trade(&mut self, pnl: f64) {
        if pnl > 0.0 {
            self.winning_trades += 1;
        }
        self.total_pnl += pnl;
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        self.winning_trades as f64 / self.total_trades as f64
    }

    pub fn total_trades(&self) -> u64 {
        self.total_trades
    }

    pub fn winning_trades(&self) -> u64 {
        self.winning_trades
    }

    pub fn total_pnl(&self) -> f64 {
        self.total_pnl
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            total_trades: self.total_trades,
            winning_trades: self.winning_trades,
            total_pnl: self.total_pnl,
            win_rate: self.win_rate(),
        }
    }
}
