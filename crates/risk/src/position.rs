use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use common::{
    Direction, Error, ExecutionGateway, ExitReason, Order, OrderResult, PositionSide, Result,
    RiskParameters,
};

use crate::sizing::{to_decimal, SizingPolicy};
use crate::stats::StatsTracker;

/// Slack for threshold checks when prices do not fit a `Decimal`.
const THRESHOLD_EPSILON: f64 = 1e-12;

/// The single open position. FLAT is represented by its absence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenPosition {
    pub direction: Direction,
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    /// Fraction, not percent: -0.02 is a 2% loss.
    pub unrealized_pnl_pct: f64,
    pub order_id: String,
    pub opened_at: DateTime<Utc>,
}

/// A completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
    pub reason: ExitReason,
    pub is_win: bool,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

/// Owns the position state machine and is the only caller of the gateway.
///
/// FLAT -> OPEN happens only on a confirmed fill; OPEN -> FLAT only on a
/// confirmed exit fill. Any gateway failure leaves the state as it was.
pub struct PositionManager {
    gateway: Arc<dyn ExecutionGateway>,
    symbol: String,
    sizing: SizingPolicy,
    risk: RiskParameters,
    position: Option<OpenPosition>,
    stats: StatsTracker,
}

impl PositionManager {
    pub fn new(
        gateway: Arc<dyn ExecutionGateway>,
        symbol: impl Into<String>,
        sizing: SizingPolicy,
        risk: RiskParameters,
    ) -> Self {
        Self {
            gateway,
            symbol: symbol.into(),
            sizing,
            risk,
            position: None,
            stats: StatsTracker::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> PositionSide {
        self.position
            .as_ref()
            .map(|p| PositionSide::from(p.direction))
            .unwrap_or_default()
    }

    pub fn position(&self) -> Option<&OpenPosition> {
        self.position.as_ref()
    }

    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    pub fn risk(&self) -> &RiskParameters {
        &self.risk
    }

    /// Open a position in `direction` at market.
    ///
    /// `reference_price` is the latest observed price, used for notional
    /// sizing. Fails with `Error::PositionOpen` if not flat.
    pub async fn open(&mut self, direction: Direction, reference_price: Option<f64>) -> Result<()> {
        if self.position.is_some() {
            return Err(Error::PositionOpen);
        }

        let quantity = self.sizing.entry_quantity(reference_price).map_err(|e| {
            warn!(symbol = %self.symbol, %direction, error = %e, "Entry aborted: invalid size");
            e
        })?;

        let order = Order::market(&self.symbol, direction.entry_side(), quantity);
        info!(
            symbol = %self.symbol,
            side = %order.side,
            quantity,
            client_order_id = %order.id,
            "Submitting entry order"
        );

        let fill = self
            .gateway
            .place_order(&order)
            .await
            .and_then(|fill| validate_fill(&fill).map(|_| fill))
            .map_err(|e| {
                error!(symbol = %self.symbol, %direction, error = %e, "Entry order failed, staying flat");
                e
            })?;

        let entry = fill.avg_fill_price;
        let (stop_loss_price, take_profit_price) = match direction {
            Direction::Long => (
                entry * (1.0 - self.risk.stop_loss_pct),
                entry * (1.0 + self.risk.take_profit_pct),
            ),
            Direction::Short => (
                entry * (1.0 + self.risk.stop_loss_pct),
                entry * (1.0 - self.risk.take_profit_pct),
            ),
        };

        let position = OpenPosition {
            direction,
            entry_price: entry,
            size: fill.filled_qty,
            stop_loss_price: self.sizing.round_price(stop_loss_price),
            take_profit_price: self.sizing.round_price(take_profit_price),
            unrealized_pnl_pct: 0.0,
            order_id: fill.order_id,
            opened_at: fill.timestamp,
        };

        info!(
            symbol = %self.symbol,
            %direction,
            entry_price = position.entry_price,
            size = position.size,
            stop_loss = position.stop_loss_price,
            take_profit = position.take_profit_price,
            "Position opened"
        );

        self.position = Some(position);
        self.stats.record_entry();
        Ok(())
    }

    /// Mark the open position to `price` and exit on a stop-loss or
    /// take-profit breach. Returns the trade if the position was closed.
    pub async fn on_tick(&mut self, price: f64) -> Option<TradeRecord> {
        if !price.is_finite() || price <= 0.0 {
            return None;
        }
        let position = self.position.as_mut()?;

        let pnl_pct = (price - position.entry_price) / position.entry_price
            * position.direction.sign();
        position.unrealized_pnl_pct = pnl_pct;

        let reason = exit_reason(position, price, pnl_pct, &self.risk)?;

        info!(symbol = %self.symbol, price, pnl_pct, %reason, "Exit threshold reached");
        self.close(reason).await.ok()
    }

    /// Flatten the open position at market.
    ///
    /// On failure the position stays open and the error is returned.
    pub async fn close(&mut self, reason: ExitReason) -> Result<TradeRecord> {
        let position = self.position.clone().ok_or(Error::NoPosition)?;

        let order = Order::market(&self.symbol, position.direction.exit_side(), position.size);
        info!(
            symbol = %self.symbol,
            side = %order.side,
            quantity = order.quantity,
            client_order_id = %order.id,
            %reason,
            "Submitting exit order"
        );

        let fill = self
            .gateway
            .place_order(&order)
            .await
            .and_then(|fill| validate_fill(&fill).map(|_| fill))
            .map_err(|e| {
                error!(symbol = %self.symbol, %reason, error = %e, "Exit order failed, position stays open");
                e
            })?;

        let exit_price = fill.avg_fill_price;
        let pnl = (exit_price - position.entry_price)
            * position.size
            * self.risk.contract_multiplier
            * position.direction.sign();

        let record = TradeRecord {
            direction: position.direction,
            entry_price: position.entry_price,
            exit_price,
            size: position.size,
            pnl,
            reason,
            is_win: pnl > 0.0,
            opened_at: position.opened_at,
            closed_at: fill.timestamp,
        };

        self.position = None;
        self.stats.record_trade(pnl);

        info!(
            symbol = %self.symbol,
            direction = %record.direction,
            entry_price = record.entry_price,
            exit_price,
            pnl,
            %reason,
            win_rate = self.stats.win_rate(),
            total_pnl = self.stats.total_pnl(),
            "Position closed"
        );
        Ok(record)
    }
}

/// Stop-loss takes priority if both somehow hold. Both bounds are inclusive
/// at the decimal prices, so 0.686 is a 2% stop for an entry at 0.7.
fn exit_reason(
    position: &OpenPosition,
    price: f64,
    pnl_pct: f64,
    risk: &RiskParameters,
) -> Option<ExitReason> {
    let (hit_stop, hit_target) = match decimal_pnl_pct(position, price)
        .zip(to_decimal(risk.stop_loss_pct))
        .zip(to_decimal(risk.take_profit_pct))
    {
        Some(((pct, sl), tp)) => (pct <= -sl, pct >= tp),
        None => (
            pnl_pct <= -risk.stop_loss_pct + THRESHOLD_EPSILON,
            pnl_pct >= risk.take_profit_pct - THRESHOLD_EPSILON,
        ),
    };

    if hit_stop {
        Some(ExitReason::StopLoss)
    } else if hit_target {
        Some(ExitReason::TakeProfit)
    } else {
        None
    }
}

fn decimal_pnl_pct(position: &OpenPosition, price: f64) -> Option<Decimal> {
    let entry = to_decimal(position.entry_price)?;
    let pct = to_decimal(price)?.checked_sub(entry)?.checked_div(entry)?;
    Some(match position.direction {
        Direction::Long => pct,
        Direction::Short => -pct,
    })
}

fn validate_fill(fill: &OrderResult) -> Result<()> {
    if !(fill.filled_qty.is_finite() && fill.filled_qty > 0.0)
        || !(fill.avg_fill_price.is_finite() && fill.avg_fill_price > 0.0)
    {
        return Err(Error::Exchange(format!(
            "unusable fill for order {}: qty {} @ {}",
            fill.order_id, fill.filled_qty, fill.avg_fill_price
        )));
    }
    Ok(())
}
