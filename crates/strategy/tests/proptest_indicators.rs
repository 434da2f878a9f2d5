use chrono::{Duration, TimeZone, Utc};
use common::Candle;
use proptest::prelude::*;
use strategy::{CandleStore, IndicatorEngine};

fn store_from(closes: &[f64]) -> CandleStore {
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let mut store = CandleStore::new(500);
    for (i, &close) in closes.iter().enumerate() {
        store
            .append(Candle {
                open_time: start + Duration::minutes(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .unwrap();
    }
    store
}

proptest! {
    /// RSI stays within [0, 100] for any positive price series.
    #[test]
    fn rsi_is_bounded(
        closes in prop::collection::vec(0.0001f64..1_000_000.0f64, 2..120),
        period in 1usize..40,
    ) {
        let store = store_from(&closes);
        if let Some(rsi) = IndicatorEngine::new(&store).rsi(period) {
            prop_assert!((0.0..=100.0).contains(&rsi), "rsi {} out of range", rsi);
        } else {
            prop_assert!(closes.len() < period + 1);
        }
    }

    /// SMA is unavailable exactly when there are fewer candles than the period.
    #[test]
    fn sma_availability_matches_history(
        closes in prop::collection::vec(1.0f64..1000.0f64, 0..60),
        period in 1usize..80,
    ) {
        let store = store_from(&closes);
        let sma = IndicatorEngine::new(&store).sma(period);
        prop_assert_eq!(sma.is_some(), closes.len() >= period);
        if let Some(value) = sma {
            let window = &closes[closes.len() - period..];
            let min = window.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(value >= min - 1e-9 && value <= max + 1e-9);
        }
    }

    /// The store never grows past its capacity and keeps the newest candles.
    #[test]
    fn store_is_bounded(count in 0usize..300, capacity in 1usize..100) {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut store = CandleStore::new(capacity);
        for i in 0..count {
            let close = i as f64;
            store.append(Candle {
                open_time: start + Duration::minutes(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            }).unwrap();
        }
        prop_assert_eq!(store.len(), count.min(capacity));
        if count > 0 {
            prop_assert_eq!(store.last().unwrap().close, (count - 1) as f64);
        }
    }
}
