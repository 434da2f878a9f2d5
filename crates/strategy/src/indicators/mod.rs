pub mod rsi;
pub mod sma;

pub use rsi::RsiIndicator;
pub use sma::SmaIndicator;

use crate::CandleStore;

/// Read-only view that derives indicators from the candle store.
///
/// Every method returns `None` when the store holds too little history;
/// callers treat that as "no signal", never as zero.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorEngine<'a> {
    store: &'a CandleStore,
}

impl<'a> IndicatorEngine<'a> {
    pub fn new(store: &'a CandleStore) -> Self {
        Self { store }
    }

    /// Simple moving average of the last `period` closes.
    pub fn sma(&self, period: usize) -> Option<f64> {
        SmaIndicator::new(period).compute(&self.store.closes(period)?)
    }

    /// RSI over the last `period + 1` closes.
    pub fn rsi(&self, period: usize) -> Option<f64> {
        RsiIndicator::new(period).compute(&self.store.closes(period.checked_add(1)?)?)
    }
}
