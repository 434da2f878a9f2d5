/// Simple moving average: the arithmetic mean of the last `period` closes.
#[derive(Debug, Clone, Copy)]
pub struct SmaIndicator {
    pub period: usize,
}

impl SmaIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// Compute the SMA from close prices (oldest first).
    /// Returns `None` for a zero period or fewer than `period` values.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if self.period == 0 || closes.len() < self.period {
            return None;
        }
        let sum: f64 = closes[closes.len() - self.period..].iter().sum();
        Some(sum / self.period as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_of_known_series() {
        let sma = SmaIndicator::new(5);
        assert_eq!(sma.compute(&[100.0, 102.0, 104.0, 106.0, 108.0]), Some(104.0));
    }

    #[test]
    fn sma_zero_period_is_none() {
        assert!(SmaIndicator::new(0).compute(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn sma_insufficient_data() {
        assert!(SmaIndicator::new(5).compute(&[100.0, 102.0]).is_none());
    }
}
