use crate::domain::ids::FillId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution applied to a tracked order.
///
/// `size` is signed: positive for buys, negative for sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: FillId,
    pub timestamp: Option<DateTime<Utc>>,
    pub size: f64,
    pub price: f64,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.size.abs() * self.price
    }
}

/// How a fill was derived from an exchange order read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillSource {
    /// One trade enumerated by the exchange.
    Trade,
    /// Growth of the order's cumulative filled size.
    Aggregate,
}
