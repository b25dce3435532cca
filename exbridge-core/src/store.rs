//! Exchange store: the shared handle onto one exchange account.
//!
//! The store is built once and handed explicitly (as `Arc<ExchangeStore>`) to
//! the broker and to every feed. It owns the client and caches the account's
//! cash/value so that reading them never costs a request.

use crate::exchange::{ExchangeClient, ExchangeError, Params, RawOrder, TimeFrame};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Cash (free) and value (total) of the account currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CashValue {
    pub cash: f64,
    pub value: f64,
}

/// Free/total amounts of one wallet currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WalletBalance {
    pub cash: f64,
    pub value: f64,
}

pub struct ExchangeStore {
    client: Arc<dyn ExchangeClient>,
    currency: String,
    balance: Mutex<CashValue>,
}

impl std::fmt::Debug for ExchangeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeStore")
            .field("exchange", &self.client.name())
            .field("currency", &self.currency)
            .finish()
    }
}

impl ExchangeStore {
    pub fn new(client: Arc<dyn ExchangeClient>, currency: impl Into<String>) -> Self {
        Self {
            client,
            currency: currency.into(),
            balance: Mutex::new(CashValue::default()),
        }
    }

    pub fn client(&self) -> &dyn ExchangeClient {
        self.client.as_ref()
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Last fetched balance of the account currency.
    pub fn cached_balance(&self) -> CashValue {
        *self.balance.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetch the balance and update the cached cash/value.
    pub fn refresh_balance(&self) -> Result<CashValue, ExchangeError> {
        let balance = self.client.fetch_balance(&Params::new())?;
        let fresh = CashValue {
            cash: balance.free_of(&self.currency)?,
            value: balance.total_of(&self.currency)?,
        };
        *self.balance.lock().unwrap_or_else(|e| e.into_inner()) = fresh;
        debug!(currency = %self.currency, cash = fresh.cash, value = fresh.value, "balance refreshed");
        Ok(fresh)
    }

    /// Free/total amounts for each requested currency.
    ///
    /// A currency the account has never held is absent from the exchange's
    /// balance document and yields `KeyNotFound`.
    pub fn wallet_balance(
        &self,
        currencies: &[&str],
        params: &Params,
    ) -> Result<BTreeMap<String, WalletBalance>, ExchangeError> {
        let balance = self.client.fetch_balance(params)?;
        currencies
            .iter()
            .map(|&c| {
                Ok((
                    c.to_string(),
                    WalletBalance {
                        cash: balance.free_of(c)?,
                        value: balance.total_of(c)?,
                    },
                ))
            })
            .collect()
    }

    pub fn granularity(&self, timeframe: TimeFrame, compression: u32) -> Result<String, ExchangeError> {
        self.client.granularity_for(timeframe, compression)
    }

    pub fn fetch_open_orders(&self) -> Result<Vec<RawOrder>, ExchangeError> {
        self.client.fetch_open_orders()
    }

    /// Call an implicit private endpoint, e.g. (`"Post"`, `"order/{id}/cancel"`).
    pub fn private_end_point(
        &self,
        kind: &str,
        endpoint: &str,
        params: &Params,
    ) -> Result<serde_json::Value, ExchangeError> {
        let method = private_method_name(kind, endpoint);
        debug!(%kind, %method, "private endpoint call");
        self.client.call_private_endpoint(kind, &method, params)
    }
}

/// Implicit method name for a private endpoint:
/// `("Post", "order/{id}/cancel")` → `"private_post_order_id_cancel"`.
pub fn private_method_name(kind: &str, endpoint: &str) -> String {
    let path = endpoint
        .trim_start_matches('/')
        .replace('/', "_")
        .replace(['{', '}'], "");
    format!("private_{}_{}", kind.to_lowercase(), path.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{Balance, ExchangeCall, ReplayExchange};
    use serde_json::json;

    fn store_with_balance() -> (Arc<ReplayExchange>, ExchangeStore) {
        let ex = Arc::new(ReplayExchange::default());
        ex.set_balance(
            serde_json::from_value::<Balance>(json!({
                "free": {"USDT": 900.0, "BTC": 0.5, "ETH": null},
                "total": {"USDT": 1000.0, "BTC": 0.75, "ETH": null}
            }))
            .unwrap(),
        );
        let store = ExchangeStore::new(ex.clone(), "USDT");
        (ex, store)
    }

    #[test]
    fn method_name_translation() {
        assert_eq!(
            private_method_name("Post", "order/{id}/cancel"),
            "private_post_order_id_cancel"
        );
        assert_eq!(private_method_name("GET", "/account/Balance"), "private_get_account_balance");
    }

    #[test]
    fn refresh_updates_cache() {
        let (_, store) = store_with_balance();
        assert_eq!(store.cached_balance(), CashValue::default());
        let fresh = store.refresh_balance().unwrap();
        assert_eq!(fresh, CashValue { cash: 900.0, value: 1000.0 });
        assert_eq!(store.cached_balance(), fresh);
    }

    #[test]
    fn wallet_balance_reads_nulls_as_zero() {
        let (_, store) = store_with_balance();
        let wallets = store.wallet_balance(&["BTC", "ETH"], &Params::new()).unwrap();
        assert_eq!(wallets["BTC"], WalletBalance { cash: 0.5, value: 0.75 });
        assert_eq!(wallets["ETH"], WalletBalance::default());
    }

    #[test]
    fn wallet_balance_surfaces_unfunded_currency() {
        let (_, store) = store_with_balance();
        let err = store.wallet_balance(&["BTC", "LTC"], &Params::new()).unwrap_err();
        assert!(matches!(err, ExchangeError::KeyNotFound(_)));
    }

    #[test]
    fn private_end_point_routes_translated_name() {
        let (ex, store) = store_with_balance();
        ex.script_private("private_post_order_id_cancel", json!({"result": 1}));
        let out = store
            .private_end_point("Post", "order/{id}/cancel", &Params::new())
            .unwrap();
        assert_eq!(out, json!({"result": 1}));
        assert!(ex.calls().contains(&ExchangeCall::PrivateEndpoint {
            kind: "Post".into(),
            method: "private_post_order_id_cancel".into(),
        }));
    }

    #[test]
    fn granularity_uses_exchange_table() {
        let (_, store) = store_with_balance();
        assert_eq!(store.granularity(TimeFrame::Minutes, 15).unwrap(), "15m");
        assert!(store.granularity(TimeFrame::Minutes, 7).is_err());
    }
}
