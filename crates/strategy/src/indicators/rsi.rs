/// RSI (Relative Strength Index) indicator.
///
/// Gains and losses over the last `period` close-to-close changes are averaged
/// with a simple mean (no Wilder smoothing). Returns `None` until at least
/// `period + 1` closes are available.
#[derive(Debug, Clone, Copy)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// Compute RSI from a slice of close prices (oldest first).
    ///
    /// An average loss of exactly zero saturates at 100.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if self.period == 0 || closes.len() < self.period + 1 {
            return None;
        }

        let recent = &closes[closes.len() - (self.period + 1)..];
        let (gains, losses) = recent
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold((0.0, 0.0), |(g, l), change| {
                if change > 0.0 {
                    (g + change, l)
                } else {
                    (g, l + change.abs())
                }
            });

        let avg_gain = gains / self.period as f64;
        let avg_loss = losses / self.period as f64;

        if avg_loss == 0.0 {
            return Some(100.0);
        }

        let rs = avg_gain / avg_loss;
        Some((100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_returns_none_when_insufficient_data() {
        let rsi = RsiIndicator::new(14);
        // Need at least period+1 = 15 values
        let prices = vec![100.0; 14];
        assert!(rsi.compute(&prices).is_none());
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let rsi = RsiIndicator::new(3);
        let prices = vec![10.0, 11.0, 12.0, 13.0, 14.0];
        assert_eq!(rsi.compute(&prices), Some(100.0));
    }

    #[test]
    fn rsi_flat_prices_saturate_at_100() {
        let rsi = RsiIndicator::new(3);
        assert_eq!(rsi.compute(&[10.0, 10.0, 10.0, 10.0]), Some(100.0));
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let rsi = RsiIndicator::new(3);
        let prices = vec![14.0, 13.0, 12.0, 11.0, 10.0];
        let value = rsi.compute(&prices).unwrap();
        assert!((value - 0.0).abs() < 1e-6, "Expected ~0, got {value}");
    }

    #[test]
    fn rsi_uses_simple_average_of_last_period() {
        // Only the last 3 changes count: +2, -1, +1 -> avg gain 1, avg loss 1/3
        let rsi = RsiIndicator::new(3);
        let value = rsi.compute(&[50.0, 10.0, 12.0, 11.0, 12.0]).unwrap();
        assert!((value - 75.0).abs() < 1e-9, "got {value}");
    }

    #[test]
    fn rsi_known_value_in_range() {
        let rsi = RsiIndicator::new(14);
        let prices = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.15, 43.61, 44.33, 44.83, 45.10,
            45.15, 44.34, 44.09,
        ];
        let v = rsi.compute(&prices).unwrap();
        assert!((0.0..=100.0).contains(&v), "RSI out of range: {v}");
    }
}
