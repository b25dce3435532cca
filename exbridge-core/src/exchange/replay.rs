//! In-memory exchange that replays scripted responses.
//!
//! Order reads are served from per-order snapshot queues: each `fetch_order`
//! pops the next snapshot, and the last snapshot keeps being served once the
//! queue is down to one. Candles are served since-inclusive and limit-capped,
//! the way unified exchange APIs page OHLCV data.

use super::{Balance, ExchangeClient, ExchangeError, Params, RawOrder};
use crate::domain::{OhlcvRow, OrderId, OrderSide};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// A call observed by the replay exchange, for assertions and tracing.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeCall {
    CreateOrder {
        symbol: String,
        order_type: String,
        side: OrderSide,
        amount: f64,
        price: Option<f64>,
        params: Params,
    },
    FetchOrder(OrderId),
    CancelOrder(OrderId),
    FetchOhlcv {
        symbol: String,
        timeframe: String,
        since: Option<i64>,
        limit: usize,
    },
    FetchOpenOrders,
    FetchBalance,
    PrivateEndpoint { kind: String, method: String },
}

#[derive(Debug, Default)]
struct ReplayState {
    candles: Vec<OhlcvRow>,
    orders: HashMap<OrderId, VecDeque<RawOrder>>,
    created: VecDeque<Result<RawOrder, ExchangeError>>,
    cancels: HashMap<OrderId, RawOrder>,
    fetch_failures: HashMap<OrderId, usize>,
    ohlcv_failures: usize,
    balance: Balance,
    private_responses: HashMap<String, Value>,
    calls: Vec<ExchangeCall>,
}

/// Scripted, thread-safe `ExchangeClient`.
#[derive(Debug)]
pub struct ReplayExchange {
    name: String,
    state: Mutex<ReplayState>,
}

impl Default for ReplayExchange {
    fn default() -> Self {
        Self::new("replay")
    }
}

impl ReplayExchange {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ReplayState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ReplayState> {
        // Poisoning is ignored: the scripted state stays readable after a panic.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Scripting ──────────────────────────────────────────────────────

    /// Append candles; they are kept sorted by timestamp.
    pub fn push_candles(&self, rows: impl IntoIterator<Item = OhlcvRow>) {
        let mut st = self.state();
        st.candles.extend(rows);
        st.candles
            .sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap_or(std::cmp::Ordering::Equal));
    }

    /// Queue snapshots served by successive `fetch_order` calls for `id`.
    pub fn script_order(&self, id: &OrderId, snapshots: impl IntoIterator<Item = Value>) {
        self.state()
            .orders
            .entry(id.clone())
            .or_default()
            .extend(snapshots.into_iter().map(RawOrder::new));
    }

    /// Queue the response of the next `create_order` call.
    pub fn script_create(&self, response: Value) {
        self.state().created.push_back(Ok(RawOrder::new(response)));
    }

    /// Make the next `create_order` call fail with a submission error.
    pub fn script_create_rejection(&self, reason: impl Into<String>) {
        self.state()
            .created
            .push_back(Err(ExchangeError::Submission(reason.into())));
    }

    /// Response returned by `cancel_order` for `id`.
    pub fn script_cancel(&self, id: &OrderId, response: Value) {
        self.state().cancels.insert(id.clone(), RawOrder::new(response));
    }

    /// Fail the next `n` `fetch_order` calls for `id` with a transport error.
    pub fn fail_fetches(&self, id: &OrderId, n: usize) {
        *self.state().fetch_failures.entry(id.clone()).or_default() += n;
    }

    /// Fail the next `n` `fetch_ohlcv` calls with a transport error.
    pub fn fail_ohlcv(&self, n: usize) {
        self.state().ohlcv_failures += n;
    }

    pub fn set_balance(&self, balance: Balance) {
        self.state().balance = balance;
    }

    pub fn script_private(&self, method: impl Into<String>, response: Value) {
        self.state().private_responses.insert(method.into(), response);
    }

    // ── Inspection ─────────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<ExchangeCall> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, pred: impl Fn(&ExchangeCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

impl ExchangeClient for ReplayExchange {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_order(
        &self,
        symbol: &str,
        order_type: &str,
        side: OrderSide,
        amount: f64,
        price: Option<f64>,
        params: &Params,
    ) -> Result<RawOrder, ExchangeError> {
        let mut st = self.state();
        st.calls.push(ExchangeCall::CreateOrder {
            symbol: symbol.to_string(),
            order_type: order_type.to_string(),
            side,
            amount,
            price,
            params: params.clone(),
        });
        let response = st.created.pop_front().unwrap_or_else(|| {
            Err(ExchangeError::Submission("no scripted create response".into()))
        })?;
        let id = response.id()?;
        st.orders.entry(id).or_insert_with(|| VecDeque::from([response.clone()]));
        Ok(response)
    }

    fn fetch_order(&self, id: &OrderId, _symbol: &str) -> Result<RawOrder, ExchangeError> {
        let mut st = self.state();
        st.calls.push(ExchangeCall::FetchOrder(id.clone()));

        if let Some(n) = st.fetch_failures.get_mut(id) {
            if *n > 0 {
                *n -= 1;
                return Err(ExchangeError::Transport(format!("fetch_order {id} timed out")));
            }
        }

        let queue = st
            .orders
            .get_mut(id)
            .ok_or_else(|| ExchangeError::Transport(format!("order {id} not found")))?;
        let snapshot = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        snapshot.ok_or_else(|| ExchangeError::Transport(format!("order {id} has no snapshot")))
    }

    fn cancel_order(&self, id: &OrderId, _symbol: &str) -> Result<RawOrder, ExchangeError> {
        let mut st = self.state();
        st.calls.push(ExchangeCall::CancelOrder(id.clone()));
        Ok(st
            .cancels
            .get(id)
            .cloned()
            .unwrap_or_else(|| RawOrder::new(json!({"id": id.as_str(), "status": "canceled"}))))
    }

    fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        since: Option<i64>,
        limit: usize,
        _params: &Params,
    ) -> Result<Vec<OhlcvRow>, ExchangeError> {
        let mut st = self.state();
        st.calls.push(ExchangeCall::FetchOhlcv {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            since,
            limit,
        });

        if st.ohlcv_failures > 0 {
            st.ohlcv_failures -= 1;
            return Err(ExchangeError::Transport("fetch_ohlcv timed out".into()));
        }

        let since = since.map(|s| s as f64).unwrap_or(f64::MIN);
        Ok(st
            .candles
            .iter()
            .filter(|row| row[0].map_or(true, |ts| ts >= since))
            .take(limit)
            .copied()
            .collect())
    }

    fn fetch_open_orders(&self) -> Result<Vec<RawOrder>, ExchangeError> {
        let mut st = self.state();
        st.calls.push(ExchangeCall::FetchOpenOrders);
        Ok(st
            .orders
            .values()
            .filter_map(|q| q.front())
            .filter(|o| o.status() == Some("open"))
            .cloned()
            .collect())
    }

    fn fetch_balance(&self, _params: &Params) -> Result<Balance, ExchangeError> {
        let mut st = self.state();
        st.calls.push(ExchangeCall::FetchBalance);
        Ok(st.balance.clone())
    }

    fn call_private_endpoint(
        &self,
        kind: &str,
        method: &str,
        _params: &Params,
    ) -> Result<Value, ExchangeError> {
        let mut st = self.state();
        st.calls.push(ExchangeCall::PrivateEndpoint {
            kind: kind.to_string(),
            method: method.to_string(),
        });
        st.private_responses
            .get(method)
            .cloned()
            .ok_or_else(|| ExchangeError::Transport(format!("no such endpoint: {method}")))
    }
}
