//! Order reconciliation broker.
//!
//! Tracks submitted exchange orders and, on each `tick()`, reads every open
//! order back from the exchange, applies newly observed fills to positions,
//! classifies the order's lifecycle and publishes order snapshots:
//!
//! 1. Fetch the exchange's current view of the order
//! 2. Detect new fills (trade-list or aggregate policy) and apply each once
//! 3. Apply the closed/canceled/rejected predicates and retire terminal orders
//!
//! The broker keeps no timers: callers decide how often to tick.

pub mod fills;
pub mod mapping;
pub mod positions;
pub mod reconciler;

pub use fills::{detect_fills, incremental_price, DetectedFill};
pub use mapping::{BalanceRefresh, BrokerMapping, FillPolicy, OrderTypeTable, StatusPredicate};
pub use positions::PositionStore;
pub use reconciler::{Broker, OrderRequest};

use crate::domain::{OrderId, OrderStatus};
use crate::exchange::ExchangeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("order submission failed: {0}")]
    Submission(#[source] ExchangeError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("order {0} is not tracked by this broker")]
    UnknownOrder(OrderId),
}

/// One order whose reconciliation failed during a tick. The order stays open.
#[derive(Debug, Clone, PartialEq)]
pub struct TickFailure {
    pub order_id: OrderId,
    pub error: ExchangeError,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Orders read back from the exchange this pass.
    pub visited: usize,
    /// Fills applied across all orders.
    pub fills: usize,
    /// Orders retired this pass with their terminal status.
    pub retired: Vec<(OrderId, OrderStatus)>,
    pub failures: Vec<TickFailure>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
