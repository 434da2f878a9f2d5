use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use common::{Error, Result, SizingMode, SymbolIncrements};

/// Headroom applied when an order is bumped up to the minimum notional.
const MIN_NOTIONAL_BUFFER: f64 = 1.01;

/// Truncate `raw` toward zero to a multiple of `step_size`.
///
/// Never returns more than `raw`. A non-positive step leaves `raw` unchanged.
pub fn round_quantity(raw: f64, step_size: f64) -> f64 {
    to_increment(raw, step_size, Rounding::TowardZero)
}

/// Floor `raw` to a multiple of `tick_size`.
pub fn round_price(raw: f64, tick_size: f64) -> f64 {
    to_increment(raw, tick_size, Rounding::Down)
}

#[derive(Debug, Clone, Copy)]
enum Rounding {
    TowardZero,
    Down,
}

/// Rounds in decimal space so that e.g. `0.12345` at step `0.001` is exactly
/// `0.123` rather than whatever the binary quotient happens to floor to.
fn to_increment(raw: f64, increment: f64, rounding: Rounding) -> f64 {
    if !raw.is_finite() || !increment.is_finite() || increment <= 0.0 {
        return raw;
    }

    let rounded = to_decimal(raw).zip(to_decimal(increment)).and_then(|(r, inc)| {
        let steps = r.checked_div(inc)?;
        let steps = match rounding {
            Rounding::TowardZero => steps.trunc(),
            Rounding::Down => steps.floor(),
        };
        steps.checked_mul(inc)
    });

    match rounded {
        Some(value) => from_decimal(value),
        // Out of decimal range: fall back to float math.
        None => {
            let steps = raw / increment;
            let steps = match rounding {
                Rounding::TowardZero => steps.trunc(),
                Rounding::Down => steps.floor(),
            };
            steps * increment
        }
    }
}

pub(crate) fn to_decimal(value: f64) -> Option<Decimal> {
    // Display gives the shortest representation that round-trips.
    value.to_string().parse().ok()
}

fn from_decimal(value: Decimal) -> f64 {
    value
        .normalize()
        .to_string()
        .parse()
        .ok()
        .or_else(|| value.to_f64())
        .unwrap_or(0.0)
}

/// Turn a notional target into an exchange-legal quantity.
///
/// If the rounded order falls under the venue's minimum notional, it is
/// resized to the minimum plus 1% headroom.
pub fn size_for_entry(
    target_exposure: f64,
    current_price: f64,
    increments: &SymbolIncrements,
) -> Result<f64> {
    if !current_price.is_finite() || current_price <= 0.0 {
        return Err(Error::InvalidQuantity(format!(
            "reference price must be positive, got {current_price}"
        )));
    }

    let mut quantity = round_quantity(target_exposure / current_price, increments.step_size);

    if quantity * current_price < increments.min_notional {
        quantity = round_quantity(
            increments.min_notional / current_price * MIN_NOTIONAL_BUFFER,
            increments.step_size,
        );
    }

    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(Error::InvalidQuantity(format!(
            "computed quantity {quantity} for exposure {target_exposure} at {current_price}"
        )));
    }
    Ok(quantity)
}

/// Converts a desired exposure into an order quantity for one symbol.
#[derive(Debug, Clone, Copy)]
pub struct SizingPolicy {
    mode: SizingMode,
    increments: SymbolIncrements,
}

impl SizingPolicy {
    pub fn new(mode: SizingMode, increments: SymbolIncrements) -> Self {
        Self { mode, increments }
    }

    pub fn mode(&self) -> SizingMode {
        self.mode
    }

    pub fn increments(&self) -> &SymbolIncrements {
        &self.increments
    }

    /// Quantity to request for a new entry.
    ///
    /// Notional sizing needs a reference price; fixed-lot sizing ignores it.
    pub fn entry_quantity(&self, reference_price: Option<f64>) -> Result<f64> {
        match self.mode {
            SizingMode::Notional { target_exposure } => {
                let price = reference_price.ok_or_else(|| {
                    Error::InvalidQuantity("no reference price yet".to_string())
                })?;
                size_for_entry(target_exposure, price, &self.increments)
            }
            SizingMode::FixedLot { quantity } => {
                if quantity.is_finite() && quantity > 0.0 {
                    Ok(quantity)
                } else {
                    Err(Error::InvalidQuantity(format!(
                        "fixed lot quantity must be positive, got {quantity}"
                    )))
                }
            }
        }
    }

    pub fn round_price(&self, raw: f64) -> f64 {
        round_price(raw, self.increments.tick_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn increments() -> SymbolIncrements {
        SymbolIncrements {
            tick_size: 0.01,
            step_size: 0.001,
            min_notional: 10.0,
        }
    }

    #[test]
    fn quantity_truncates_to_step() {
        assert_eq!(round_quantity(0.12345, 0.001), 0.123);
        assert_eq!(round_quantity(0.1239, 0.001), 0.123);
        assert_eq!(round_quantity(5.0, 0.001), 5.0);
        assert_eq!(round_quantity(7.9, 1.0), 7.0);
    }

    #[test]
    fn quantity_below_one_step_is_zero() {
        assert_eq!(round_quantity(0.0004, 0.001), 0.0);
    }

    #[test]
    fn price_floors_to_tick() {
        assert_eq!(round_price(98.0, 0.01), 98.0);
        assert_eq!(round_price(123.456, 0.01), 123.45);
        assert_eq!(round_price(1234.56, 0.1), 1234.5);
        assert_eq!(round_price(1234.0, 5.0), 1230.0);
    }

    #[test]
    fn zero_increment_leaves_value_unchanged() {
        assert_eq!(round_quantity(0.12345, 0.0), 0.12345);
        assert_eq!(round_price(10.5, -1.0), 10.5);
    }

    #[test]
    fn min_notional_scenario_d() {
        // 0.12345 truncates to 0.123, notional 6.15 < 10 -> resized to 10/50*1.01
        assert_eq!(round_quantity(0.12345, 0.001), 0.123);
        let qty = size_for_entry(0.12345 * 50.0, 50.0, &increments()).unwrap();
        assert_eq!(qty, 0.202);
    }

    #[test]
    fn notional_sizing_above_minimum() {
        let qty = size_for_entry(100.0, 30_000.0, &SymbolIncrements {
            tick_size: 0.01,
            step_size: 0.00001,
            min_notional: 5.0,
        })
        .unwrap();
        assert_eq!(qty, 0.00333);
    }

    #[test]
    fn non_positive_price_is_rejected() {
        assert!(size_for_entry(100.0, 0.0, &increments()).is_err());
        assert!(size_for_entry(100.0, f64::NAN, &increments()).is_err());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        // No min notional and a target smaller than one step
        let inc = SymbolIncrements {
            tick_size: 0.01,
            step_size: 1.0,
            min_notional: 0.0,
        };
        let err = size_for_entry(10.0, 50.0, &inc).unwrap_err();
        assert!(matches!(err, Error::InvalidQuantity(_)));
    }

    #[test]
    fn fixed_lot_ignores_price() {
        let policy = SizingPolicy::new(SizingMode::FixedLot { quantity: 2.0 }, increments());
        assert_eq!(policy.entry_quantity(None).unwrap(), 2.0);
        assert_eq!(policy.entry_quantity(Some(1_000_000.0)).unwrap(), 2.0);
    }

    #[test]
    fn notional_policy_needs_a_price() {
        let policy = SizingPolicy::new(
            SizingMode::Notional {
                target_exposure: 100.0,
            },
            increments(),
        );
        assert!(policy.entry_quantity(None).is_err());
        assert_eq!(policy.entry_quantity(Some(50.0)).unwrap(), 2.0);
    }
}
