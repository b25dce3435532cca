//! Broker policy tables: order-type names, terminal-status predicates,
//! fill-detection and balance-refresh policies.
//!
//! A `BrokerMapping` is fixed when the broker is built; the broker only ever
//! reads it.

use crate::domain::ExecType;
use crate::exchange::RawOrder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `(field, expected value)` pair matched against a raw order document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPredicate {
    pub key: String,
    pub value: Value,
}

impl StatusPredicate {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Numbers compare by value, so `1` matches `1.0`.
    pub fn matches(&self, order: &RawOrder) -> bool {
        match (order.0.get(&self.key), &self.value) {
            (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
            (Some(actual), expected) => actual == expected,
            (None, _) => false,
        }
    }
}

/// Exchange order-type strings per execution type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderTypeTable {
    pub market: String,
    pub limit: String,
    /// "stop-loss" on Kraken, "stop" on BitMEX.
    pub stop: String,
    pub stop_limit: String,
}

impl Default for OrderTypeTable {
    fn default() -> Self {
        Self {
            market: "market".into(),
            limit: "limit".into(),
            stop: "stop".into(),
            stop_limit: "stop limit".into(),
        }
    }
}

impl OrderTypeTable {
    pub fn get(&self, exec_type: ExecType) -> &str {
        match exec_type {
            ExecType::Market => &self.market,
            ExecType::Limit => &self.limit,
            ExecType::Stop => &self.stop,
            ExecType::StopLimit => &self.stop_limit,
        }
    }
}

/// How new fills are derived from an order read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Trade list when the response carries one, aggregate otherwise.
    #[default]
    Auto,
    /// Apply each enumerated trade exactly once.
    TradeList,
    /// Diff the cumulative filled size and value against the last read.
    Aggregate,
}

/// When the broker refreshes the cached account balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceRefresh {
    #[default]
    EveryFill,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerMapping {
    pub order_types: OrderTypeTable,
    pub closed_order: StatusPredicate,
    pub canceled_order: StatusPredicate,
    pub rejected_order: StatusPredicate,
    pub fill_policy: FillPolicy,
    pub balance_refresh: BalanceRefresh,
}

impl Default for BrokerMapping {
    fn default() -> Self {
        Self {
            order_types: OrderTypeTable::default(),
            closed_order: StatusPredicate::new("status", "closed"),
            canceled_order: StatusPredicate::new("status", "canceled"),
            rejected_order: StatusPredicate::new("status", "rejected"),
            fill_policy: FillPolicy::default(),
            balance_refresh: BalanceRefresh::default(),
        }
    }
}

impl BrokerMapping {
    pub fn with_fill_policy(mut self, policy: FillPolicy) -> Self {
        self.fill_policy = policy;
        self
    }

    pub fn with_balance_refresh(mut self, refresh: BalanceRefresh) -> Self {
        self.balance_refresh = refresh;
        self
    }

    pub fn with_canceled_order(mut self, predicate: StatusPredicate) -> Self {
        self.canceled_order = predicate;
        self
    }

    pub fn with_closed_order(mut self, predicate: StatusPredicate) -> Self {
        self.closed_order = predicate;
        self
    }

    /// Closed or canceled: nothing left to cancel.
    pub fn is_done(&self, order: &RawOrder) -> bool {
        self.closed_order.matches(order) || self.canceled_order.matches(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn predicate_matches_strings_and_numbers() {
        let raw = RawOrder::new(json!({"status": "closed", "result": 1.0}));
        assert!(StatusPredicate::new("status", "closed").matches(&raw));
        assert!(StatusPredicate::new("result", 1).matches(&raw));
        assert!(!StatusPredicate::new("status", "canceled").matches(&raw));
        assert!(!StatusPredicate::new("missing", "x").matches(&raw));
    }

    #[test]
    fn default_order_types() {
        let table = OrderTypeTable::default();
        assert_eq!(table.get(ExecType::Market), "market");
        assert_eq!(table.get(ExecType::StopLimit), "stop limit");
    }

    #[test]
    fn done_covers_closed_and_canceled() {
        let mapping = BrokerMapping::default();
        assert!(mapping.is_done(&RawOrder::new(json!({"status": "closed"}))));
        assert!(mapping.is_done(&RawOrder::new(json!({"status": "canceled"}))));
        assert!(!mapping.is_done(&RawOrder::new(json!({"status": "open"}))));
    }
}
