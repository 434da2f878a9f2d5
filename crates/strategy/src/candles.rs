use std::collections::VecDeque;

use common::{Candle, Error, Result};

/// Bounded, time-ordered history of closed candles for one symbol.
///
/// Owned by the engine task; there is a single writer, so no locking.
#[derive(Debug, Clone)]
pub struct CandleStore {
    candles: VecDeque<Candle>,
    capacity: usize,
}

impl CandleStore {
    pub const DEFAULT_CAPACITY: usize = 200;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            candles: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a closed candle, evicting the oldest one when full.
    ///
    /// A candle that does not open strictly after the last stored one is
    /// rejected and the store is left untouched.
    pub fn append(&mut self, candle: Candle) -> Result<()> {
        if let Some(last) = self.candles.back() {
            if candle.open_time <= last.open_time {
                return Err(Error::OutOfOrderCandle {
                    last: last.open_time,
                    got: candle.open_time,
                });
            }
        }

        if self.candles.len() == self.capacity {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
        Ok(())
    }

    /// Seed from historical candles (oldest first). Out-of-order entries are
    /// skipped. Returns how many were stored.
    pub fn seed<I>(&mut self, candles: I) -> usize
    where
        I: IntoIterator<Item = Candle>,
    {
        candles
            .into_iter()
            .filter(|c| self.append(*c).is_ok())
            .count()
    }

    /// The `k` most recent candles, oldest first, or `None` if fewer exist.
    pub fn window(&self, k: usize) -> Option<Vec<Candle>> {
        if self.candles.len() < k {
            return None;
        }
        Some(self.candles.iter().skip(self.candles.len() - k).copied().collect())
    }

    /// Close prices of the `k` most recent candles, oldest first.
    pub fn closes(&self, k: usize) -> Option<Vec<f64>> {
        if self.candles.len() < k {
            return None;
        }
        Some(
            self.candles
                .iter()
                .skip(self.candles.len() - k)
                .map(|c| c.close)
                .collect(),
        )
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CandleStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
