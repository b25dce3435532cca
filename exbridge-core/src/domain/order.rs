//! Tracked orders: the local view of an exchange order under observation.

use super::fill::{Fill, FillSource};
use super::ids::{FillId, OrderId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Sign applied to unsigned exchange sizes: +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }

    /// Parse the unified exchange side string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Some(OrderSide::Buy),
            "sell" => Some(OrderSide::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution type requested by the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

/// Local lifecycle of a tracked order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }
}

/// One exchange order under local observation.
///
/// Mutated only by the broker's reconciliation pass. Snapshots handed to the
/// notification channel are independent clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedOrder {
    pub id: OrderId,
    pub instrument: String,
    pub side: OrderSide,
    pub exec_type: ExecType,
    pub requested_size: f64,
    pub requested_price: Option<f64>,
    /// Signed cumulative filled size; magnitude never decreases.
    pub filled_size: f64,
    /// Cumulative notional of all applied fills.
    pub filled_value: f64,
    pub processed_fill_ids: HashSet<FillId>,
    pub fills: Vec<Fill>,
    /// `Aggregate` once any aggregate-derived fill was applied. Trade ids
    /// cannot be matched against those fills, so the order stays aggregate.
    pub fill_source: Option<FillSource>,
    pub status: OrderStatus,
    /// Raw `status` string from the most recent exchange read.
    pub exchange_status: Option<String>,
}

impl TrackedOrder {
    pub fn new(
        id: OrderId,
        instrument: impl Into<String>,
        side: OrderSide,
        exec_type: ExecType,
        requested_size: f64,
        requested_price: Option<f64>,
    ) -> Self {
        Self {
            id,
            instrument: instrument.into(),
            side,
            exec_type,
            requested_size,
            requested_price,
            filled_size: 0.0,
            filled_value: 0.0,
            processed_fill_ids: HashSet::new(),
            fills: Vec::new(),
            fill_source: None,
            status: OrderStatus::Submitted,
            exchange_status: None,
        }
    }

    /// Average execution price over all applied fills, if anything filled.
    pub fn average_price(&self) -> Option<f64> {
        let size = self.filled_size.abs();
        (size > 0.0).then(|| self.filled_value / size)
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn has_processed(&self, fill_id: &FillId) -> bool {
        self.processed_fill_ids.contains(fill_id)
    }

    /// Record an applied fill. Returns false (and changes nothing) for a
    /// fill id that was already processed.
    pub fn record_fill(&mut self, fill: Fill) -> bool {
        if !self.processed_fill_ids.insert(fill.id.clone()) {
            return false;
        }
        self.filled_size += fill.size;
        self.filled_value += fill.notional();
        self.fills.push(fill);
        true
    }

    /// `record_fill`, also tracking where the fill came from.
    pub fn apply_fill(&mut self, fill: Fill, source: FillSource) -> bool {
        if !self.record_fill(fill) {
            return false;
        }
        if source == FillSource::Aggregate || self.fill_source.is_none() {
            self.fill_source = Some(source);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(side: OrderSide) -> TrackedOrder {
        TrackedOrder::new(OrderId::new("1"), "BTC/USDT", side, ExecType::Limit, 2.0, Some(100.0))
    }

    fn fill(id: &str, size: f64, price: f64) -> Fill {
        Fill {
            id: FillId::new(id),
            timestamp: None,
            size,
            price,
        }
    }

    #[test]
    fn record_fill_accumulates_signed_size() {
        let mut o = order(OrderSide::Sell);
        assert!(o.record_fill(fill("a", -0.5, 100.0)));
        assert!(o.record_fill(fill("b", -1.0, 130.0)));
        assert_eq!(o.filled_size, -1.5);
        assert_eq!(o.filled_value, 180.0);
        assert_eq!(o.average_price(), Some(120.0));
    }

    #[test]
    fn duplicate_fill_is_ignored() {
        let mut o = order(OrderSide::Buy);
        assert!(o.record_fill(fill("a", 0.5, 100.0)));
        assert!(!o.record_fill(fill("a", 0.5, 100.0)));
        assert_eq!(o.filled_size, 0.5);
        assert_eq!(o.fills.len(), 1);
    }

    #[test]
    fn aggregate_source_is_sticky() {
        let mut o = order(OrderSide::Buy);
        assert!(o.apply_fill(fill("t1", 0.5, 100.0), FillSource::Trade));
        assert_eq!(o.fill_source, Some(FillSource::Trade));
        assert!(o.apply_fill(fill("o:filled:1", 0.5, 100.0), FillSource::Aggregate));
        assert_eq!(o.fill_source, Some(FillSource::Aggregate));
        assert!(o.apply_fill(fill("t2", 0.5, 100.0), FillSource::Trade));
        assert_eq!(o.fill_source, Some(FillSource::Aggregate));
        assert!(!o.apply_fill(fill("t2", 0.5, 100.0), FillSource::Trade));
        assert_eq!(o.filled_size, 1.5);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!OrderStatus::Submitted.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn side_parsing_is_case_insensitive() {
        assert_eq!(OrderSide::parse("BUY"), Some(OrderSide::Buy));
        assert_eq!(OrderSide::parse("sell"), Some(OrderSide::Sell));
        assert_eq!(OrderSide::parse("short"), None);
    }
}
