use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fill (trade) identifier, unique within one order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FillId(pub String);

impl FillId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthetic id for trades the exchange reports without one.
    pub fn synthetic(datetime: &str, amount: f64, price: f64) -> Self {
        Self(format!("{datetime}:{amount}:{price}"))
    }
}

impl fmt::Display for FillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_from_number() {
        assert_eq!(OrderId::from(42), OrderId::new("42"));
    }

    #[test]
    fn synthetic_fill_ids_differ_by_price() {
        let a = FillId::synthetic("2024-01-02T00:00:00Z", 1.0, 100.0);
        let b = FillId::synthetic("2024-01-02T00:00:00Z", 1.0, 100.5);
        assert_ne!(a, b);
    }
}
