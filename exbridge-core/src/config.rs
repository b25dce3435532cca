//! Bridge configuration.
//!
//! Loaded from TOML or JSON (chosen by file extension). Example:
//!
//! ```toml
//! [exchange]
//! name = "binance"
//! currency = "USDT"
//!
//! [broker]
//! fill_policy = "auto"
//! balance_refresh = "manual"
//! order_types = { stop = "stop-loss" }
//! canceled_order = { key = "result", value = 1 }
//!
//! [feed]
//! symbol = "BNB/USDT"
//! timeframe = "minutes"
//! compression = 1
//! from = "2021-08-01T00:00:00Z"
//! ohlcv_limit = 1000
//! drop_newest = true
//! ```

use crate::broker::{BrokerMapping, StatusPredicate};
use crate::exchange::granularity;
use crate::feed::FeedConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub name: String,
    /// Account currency used for cash/value.
    pub currency: String,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            name: "replay".into(),
            currency: "USDT".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub exchange: ExchangeSettings,
    pub broker: BrokerMapping,
    pub feed: FeedConfig,
}

impl BridgeConfig {
    /// Load from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(format!("serialize: {e}")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchange.currency.trim().is_empty() {
            return Err(ConfigError::Invalid("exchange.currency is empty".into()));
        }
        check_predicate("broker.closed_order", &self.broker.closed_order)?;
        check_predicate("broker.canceled_order", &self.broker.canceled_order)?;
        check_predicate("broker.rejected_order", &self.broker.rejected_order)?;

        let feed = &self.feed;
        if feed.compression == 0 {
            return Err(ConfigError::Invalid("feed.compression must be positive".into()));
        }
        if feed.ohlcv_limit == 0 {
            return Err(ConfigError::Invalid("feed.ohlcv_limit must be positive".into()));
        }
        if !feed.symbol.is_empty()
            && granularity::standard(feed.timeframe, feed.compression).is_none()
        {
            // Connectors may override `granularity_for`.
            tracing::warn!(
                timeframe = ?feed.timeframe,
                compression = feed.compression,
                "granularity not in the standard table"
            );
        }
        Ok(())
    }
}

fn check_predicate(name: &str, predicate: &StatusPredicate) -> Result<(), ConfigError> {
    if predicate.key.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{name}.key is empty")));
    }
    if predicate.value.is_null() {
        return Err(ConfigError::Invalid(format!("{name}.value is missing")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BalanceRefresh, FillPolicy};
    use crate::domain::ExecType;
    use crate::exchange::TimeFrame;
    use serde_json::json;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = BridgeConfig::from_toml("").unwrap();
        assert_eq!(cfg, BridgeConfig::default());
        assert_eq!(cfg.broker.closed_order, StatusPredicate::new("status", "closed"));
    }

    #[test]
    fn toml_overrides_mapping() {
        let cfg = BridgeConfig::from_toml(
            r#"
            [exchange]
            name = "kraken"
            currency = "EUR"

            [broker]
            fill_policy = "aggregate"
            balance_refresh = "manual"
            order_types = { stop = "stop-loss" }
            canceled_order = { key = "result", value = 1 }

            [feed]
            symbol = "XBT/EUR"
            timeframe = "minutes"
            compression = 5
            from = "2021-08-01T00:00:00Z"
            drop_newest = true
            "#,
        )
        .unwrap();

        assert_eq!(cfg.exchange.name, "kraken");
        assert_eq!(cfg.broker.fill_policy, FillPolicy::Aggregate);
        assert_eq!(cfg.broker.balance_refresh, BalanceRefresh::Manual);
        assert_eq!(cfg.broker.order_types.get(ExecType::Stop), "stop-loss");
        assert_eq!(cfg.broker.order_types.get(ExecType::Limit), "limit");
        assert_eq!(cfg.broker.canceled_order, StatusPredicate::new("result", 1));
        assert_eq!(cfg.feed.timeframe, TimeFrame::Minutes);
        assert_eq!(cfg.feed.compression, 5);
        assert!(cfg.feed.from.is_some());
        assert_eq!(cfg.feed.ohlcv_limit, 20);
    }

    #[test]
    fn json_config() {
        let cfg = BridgeConfig::from_json(
            &json!({
                "broker": {"closed_order": {"key": "state", "value": "filled"}},
                "feed": {"symbol": "BNB/USDT", "historical": true, "ohlcv_limit": 1000}
            })
            .to_string(),
        )
        .unwrap();
        assert_eq!(cfg.broker.closed_order, StatusPredicate::new("state", "filled"));
        assert!(cfg.feed.historical);
        assert_eq!(cfg.feed.ohlcv_limit, 1000);
    }

    #[test]
    fn rejects_empty_predicate_key() {
        let err = BridgeConfig::from_toml("[broker]\nclosed_order = { key = \"\", value = \"closed\" }")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_compression() {
        let err = BridgeConfig::from_toml("[feed]\ncompression = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn toml_roundtrip_keeps_mapping() {
        let cfg = BridgeConfig::default();
        let text = cfg.to_toml().unwrap();
        assert_eq!(BridgeConfig::from_toml(&text).unwrap(), cfg);
    }
}
