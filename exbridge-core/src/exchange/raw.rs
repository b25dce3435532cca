//! Raw exchange documents.
//!
//! Orders are kept as the untyped JSON the exchange returned so that
//! configurable status predicates can match on any field. Typed accessors
//! tolerate numbers encoded as strings.

use super::ExchangeError;
use crate::domain::{FillId, OrderId, OrderSide};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Unified order document returned by create/fetch/cancel calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawOrder(pub Value);

impl RawOrder {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn id(&self) -> Result<OrderId, ExchangeError> {
        match self.field("id") {
            Some(Value::String(s)) => Ok(OrderId::new(s.clone())),
            Some(Value::Number(n)) => Ok(OrderId::new(n.to_string())),
            _ => Err(ExchangeError::MalformedResponse(
                "order document has no id".into(),
            )),
        }
    }

    pub fn status(&self) -> Option<&str> {
        self.field("status").and_then(Value::as_str)
    }

    pub fn side(&self) -> Option<OrderSide> {
        self.field("side").and_then(Value::as_str).and_then(OrderSide::parse)
    }

    pub fn amount(&self) -> Option<f64> {
        self.number("amount")
    }

    pub fn filled(&self) -> Option<f64> {
        self.number("filled")
    }

    pub fn average(&self) -> Option<f64> {
        self.number("average")
    }

    pub fn price(&self) -> Option<f64> {
        self.number("price")
    }

    pub fn cost(&self) -> Option<f64> {
        self.number("cost")
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.number("timestamp").map(|ts| ts as i64)
    }

    /// Individual trades, if the exchange enumerated them.
    ///
    /// `Ok(None)` when the document carries no (or a null) trade list.
    pub fn trades(&self) -> Result<Option<Vec<RawTrade>>, ExchangeError> {
        match self.field("trades") {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(RawTrade::from_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(other) => Err(ExchangeError::MalformedResponse(format!(
                "trades is not a list: {other}"
            ))),
        }
    }

    fn number(&self, key: &str) -> Option<f64> {
        self.field(key).and_then(as_f64)
    }
}

impl From<Value> for RawOrder {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One trade belonging to an order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrade {
    pub id: FillId,
    pub timestamp: Option<DateTime<Utc>>,
    pub amount: f64,
    pub price: f64,
}

impl RawTrade {
    pub fn from_value(value: &Value) -> Result<Self, ExchangeError> {
        let get = |k: &str| value.get(k).filter(|v| !v.is_null());

        let amount = get("amount").and_then(as_f64).ok_or_else(|| {
            ExchangeError::MalformedResponse(format!("trade without amount: {value}"))
        })?;
        let price = get("price").and_then(as_f64).ok_or_else(|| {
            ExchangeError::MalformedResponse(format!("trade without price: {value}"))
        })?;

        let datetime = get("datetime").and_then(Value::as_str);
        let timestamp = datetime
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                get("timestamp")
                    .and_then(as_f64)
                    .and_then(|ms| DateTime::from_timestamp_millis(ms as i64))
            });

        let id = match get("id") {
            Some(Value::String(s)) => FillId::new(s.clone()),
            Some(Value::Number(n)) => FillId::new(n.to_string()),
            _ => FillId::synthetic(datetime.unwrap_or_default(), amount, price),
        };

        Ok(Self {
            id,
            timestamp,
            amount,
            price,
        })
    }
}

/// Account balance; only the `free` and `total` maps are consumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default)]
    pub free: HashMap<String, Option<f64>>,
    #[serde(default)]
    pub total: HashMap<String, Option<f64>>,
}

impl Balance {
    /// Free amount for a currency; null amounts read as zero.
    pub fn free_of(&self, currency: &str) -> Result<f64, ExchangeError> {
        lookup(&self.free, "free", currency)
    }

    /// Total amount for a currency; null amounts read as zero.
    pub fn total_of(&self, currency: &str) -> Result<f64, ExchangeError> {
        lookup(&self.total, "total", currency)
    }
}

fn lookup(
    map: &HashMap<String, Option<f64>>,
    section: &str,
    currency: &str,
) -> Result<f64, ExchangeError> {
    map.get(currency)
        .map(|v| v.unwrap_or(0.0))
        .ok_or_else(|| ExchangeError::KeyNotFound(format!("{section}.{currency}")))
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
