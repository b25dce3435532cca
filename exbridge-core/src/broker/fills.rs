//! Fill detection from an exchange order read.
//!
//! Two policies:
//! - trade list: every enumerated trade not yet processed becomes one fill at
//!   its reported price;
//! - aggregate: the growth of the cumulative filled size becomes one fill
//!   priced so that the cumulative notional stays consistent with the
//!   exchange's average price.
//!
//! `Auto` uses the trade list only when it accounts for the whole reported
//! filled size, and never for an order that already took an aggregate fill.
//!
//! Partial/complete classification follows the exchange's lifecycle status
//! for the read, never the remaining size: market buys on some exchanges are
//! sized in quote currency, so requested and filled sizes are not comparable.

use super::mapping::{FillPolicy, StatusPredicate};
use crate::domain::{Fill, FillId, FillSource, OrderStatus, TrackedOrder};
use crate::exchange::{ExchangeError, RawOrder, RawTrade};
use chrono::DateTime;
use std::collections::HashSet;

const SIZE_EPSILON: f64 = 1e-12;
/// Relative slack when comparing summed trade amounts with `filled`.
const COVER_TOLERANCE: f64 = 1e-9;

/// A newly observed fill and the order status it leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFill {
    pub fill: Fill,
    pub status: OrderStatus,
    pub source: FillSource,
}

/// Derive the fills in `raw` that have not been applied to `order` yet.
pub fn detect_fills(
    order: &TrackedOrder,
    raw: &RawOrder,
    policy: FillPolicy,
    closed: &StatusPredicate,
) -> Result<Vec<DetectedFill>, ExchangeError> {
    let completed = closed.matches(raw);
    match policy {
        FillPolicy::TradeList => Ok(from_trades(
            order,
            &raw.trades()?.unwrap_or_default(),
            completed,
        )),
        FillPolicy::Aggregate => Ok(from_aggregate(order, raw, completed).into_iter().collect()),
        FillPolicy::Auto => {
            let trades = raw.trades()?.unwrap_or_default();
            if trades_cover_fill(order, raw, &trades) {
                Ok(from_trades(order, &trades, completed))
            } else {
                Ok(from_aggregate(order, raw, completed).into_iter().collect())
            }
        }
    }
}

/// Whether the enumerated trades can be trusted as the complete fill record.
fn trades_cover_fill(order: &TrackedOrder, raw: &RawOrder, trades: &[RawTrade]) -> bool {
    if order.fill_source == Some(FillSource::Aggregate) || trades.is_empty() {
        return false;
    }
    let Some(filled) = raw.filled() else {
        return true;
    };
    let mut seen = HashSet::new();
    let listed: f64 = trades
        .iter()
        .filter(|t| seen.insert(t.id.clone()))
        .map(|t| t.amount.abs())
        .sum();
    let filled = filled.abs();
    listed >= filled - filled * COVER_TOLERANCE - SIZE_EPSILON
}

fn from_trades(order: &TrackedOrder, trades: &[RawTrade], completed: bool) -> Vec<DetectedFill> {
    let mut seen = HashSet::new();
    let fresh: Vec<&RawTrade> = trades
        .iter()
        .filter(|t| !order.has_processed(&t.id) && seen.insert(t.id.clone()))
        .collect();

    let last = fresh.len().saturating_sub(1);
    fresh
        .into_iter()
        .enumerate()
        .map(|(i, t)| DetectedFill {
            fill: Fill {
                id: t.id.clone(),
                timestamp: t.timestamp,
                size: t.amount.abs() * order.side.sign(),
                price: t.price,
            },
            status: classify(completed && i == last),
            source: FillSource::Trade,
        })
        .collect()
}

fn from_aggregate(order: &TrackedOrder, raw: &RawOrder, completed: bool) -> Option<DetectedFill> {
    let new_size = raw.filled()?.abs();
    let old_size = order.filled_size.abs();
    if new_size - old_size <= SIZE_EPSILON {
        return None;
    }

    let new_value = cumulative_value(raw, new_size, order);
    let price = incremental_price(old_size, order.filled_value, new_size, new_value);

    Some(DetectedFill {
        fill: Fill {
            id: FillId::new(format!("{}:filled:{new_size}", order.id)),
            timestamp: raw.timestamp().and_then(DateTime::from_timestamp_millis),
            size: (new_size - old_size) * order.side.sign(),
            price,
        },
        status: classify(completed),
        source: FillSource::Aggregate,
    })
}

/// Cumulative notional: `filled × average`, else the reported `cost`, else
/// `filled × order price`.
fn cumulative_value(raw: &RawOrder, filled: f64, order: &TrackedOrder) -> f64 {
    if let Some(avg) = raw.average() {
        return filled * avg;
    }
    if let Some(cost) = raw.cost() {
        return cost;
    }
    let price = raw.price().or(order.requested_price).unwrap_or(0.0);
    filled * price
}

/// Price of the increment between two cumulative observations:
/// `(new_value − old_value) / (new_size − old_size)`.
pub fn incremental_price(old_size: f64, old_value: f64, new_size: f64, new_value: f64) -> f64 {
    (new_value - old_value) / (new_size - old_size)
}

fn classify(completed: bool) -> OrderStatus {
    if completed {
        OrderStatus::Filled
    } else {
        OrderStatus::PartiallyFilled
    }
}
