//! The broker: order submission, cancellation and the reconciliation pass.

use super::fills::detect_fills;
use super::mapping::{BalanceRefresh, BrokerMapping};
use super::positions::PositionStore;
use super::{BrokerError, TickFailure, TickReport};
use crate::domain::{ExecType, OrderId, OrderSide, OrderStatus, Position, TrackedOrder};
use crate::exchange::{ExchangeError, Params, RawOrder};
use crate::notify::NotificationChannel;
use crate::store::{CashValue, ExchangeStore, WalletBalance};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A new order as requested by the strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub instrument: String,
    pub side: OrderSide,
    /// `None` submits a plain market order.
    pub exec_type: Option<ExecType>,
    pub size: f64,
    pub price: Option<f64>,
    pub params: Params,
    /// Bar time at which the strategy created the order; forwarded as `params.created`.
    pub created: Option<DateTime<Utc>>,
}

impl OrderRequest {
    pub fn market(instrument: impl Into<String>, side: OrderSide, size: f64) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            exec_type: Some(ExecType::Market),
            size,
            price: None,
            params: Params::new(),
            created: None,
        }
    }

    pub fn limit(instrument: impl Into<String>, side: OrderSide, size: f64, price: f64) -> Self {
        Self {
            exec_type: Some(ExecType::Limit),
            price: Some(price),
            ..Self::market(instrument, side, size)
        }
    }

    pub fn with_exec_type(mut self, exec_type: ExecType) -> Self {
        self.exec_type = Some(exec_type);
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }
}

/// What a single order reconciliation produced.
#[derive(Debug, Default)]
struct Reconciled {
    fills: usize,
    retired: Option<OrderStatus>,
}

pub struct Broker {
    store: Arc<ExchangeStore>,
    mapping: BrokerMapping,
    positions: PositionStore,
    notifications: NotificationChannel<TrackedOrder>,
    /// Open orders in submission order.
    open: Vec<TrackedOrder>,
    /// Orders retired in a terminal state.
    finished: HashMap<OrderId, TrackedOrder>,
}

impl Broker {
    pub fn new(store: Arc<ExchangeStore>, mapping: BrokerMapping) -> Self {
        Self {
            store,
            mapping,
            positions: PositionStore::new(),
            notifications: NotificationChannel::new(),
            open: Vec::new(),
            finished: HashMap::new(),
        }
    }

    pub fn mapping(&self) -> &BrokerMapping {
        &self.mapping
    }

    pub fn store(&self) -> &Arc<ExchangeStore> {
        &self.store
    }

    // ── Orders ─────────────────────────────────────────────────────────

    /// Send a new order, register it as open and reconcile it once so that
    /// an instant fill is reported before the caller sees the order.
    pub fn submit(&mut self, request: OrderRequest) -> Result<TrackedOrder, BrokerError> {
        let order_type = request
            .exec_type
            .map_or("market", |t| self.mapping.order_types.get(t))
            .to_string();

        let mut params = match request.params.get("params") {
            Some(Value::Object(inner)) => inner.clone(),
            _ => request.params.clone(),
        };
        if let Some(created) = request.created {
            params.insert("created".into(), json!(created.timestamp_millis()));
        }

        let client = self.store.client();
        let created = client
            .create_order(
                &request.instrument,
                &order_type,
                request.side,
                request.size,
                request.price,
                &params,
            )
            .map_err(BrokerError::Submission)?;
        let id = created.id().map_err(BrokerError::Submission)?;

        let canonical = match client.fetch_order(&id, &request.instrument) {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!(order_id = %id, error = %e, "read-back after submit failed, next tick reconciles");
                None
            }
        };
        let view = canonical.as_ref().unwrap_or(&created);

        let mut order = TrackedOrder::new(
            id.clone(),
            request.instrument.as_str(),
            view.side().unwrap_or(request.side),
            request.exec_type.unwrap_or(ExecType::Market),
            view.amount().unwrap_or(request.size),
            created.price().or(request.price),
        );
        order.exchange_status = view.status().map(str::to_string);

        info!(
            order_id = %id,
            instrument = %order.instrument,
            side = %order.side,
            order_type = %order_type,
            size = order.requested_size,
            "order submitted"
        );
        self.notifications.publish(order.clone());
        self.open.push(order);

        if let Some(raw) = canonical {
            if let Err(e) = self.apply_observation(&id, &raw) {
                warn!(order_id = %id, error = %e, "initial reconciliation failed");
            }
        }

        self.order(&id)
            .cloned()
            .ok_or(BrokerError::UnknownOrder(id))
    }

    pub fn buy(
        &mut self,
        instrument: &str,
        size: f64,
        price: Option<f64>,
        exec_type: Option<ExecType>,
    ) -> Result<TrackedOrder, BrokerError> {
        self.submit(OrderRequest {
            exec_type,
            price,
            ..OrderRequest::market(instrument, OrderSide::Buy, size)
        })
    }

    pub fn sell(
        &mut self,
        instrument: &str,
        size: f64,
        price: Option<f64>,
        exec_type: Option<ExecType>,
    ) -> Result<TrackedOrder, BrokerError> {
        self.submit(OrderRequest {
            exec_type,
            price,
            ..OrderRequest::market(instrument, OrderSide::Sell, size)
        })
    }

    /// Cancel an order.
    ///
    /// An order the exchange already reports closed or canceled is returned
    /// unchanged without a cancel request. Otherwise the cancel is sent, one
    /// reconciliation pass captures any last-moment fill, and the order is
    /// marked canceled only if the exchange confirmed the cancel.
    pub fn cancel(&mut self, order: &TrackedOrder) -> Result<TrackedOrder, BrokerError> {
        let id = &order.id;
        let Some(current) = self.open_order(id).cloned() else {
            return Ok(self.finished.get(id).cloned().unwrap_or_else(|| order.clone()));
        };

        let client = self.store.client();
        let raw = client.fetch_order(id, &current.instrument)?;
        if self.mapping.is_done(&raw) {
            debug!(order_id = %id, status = ?raw.status(), "cancel skipped, order already done");
            return Ok(current);
        }

        let response = client.cancel_order(id, &current.instrument)?;
        debug!(order_id = %id, response = %response.0, "cancel sent");

        let report = self.tick();
        for failure in &report.failures {
            warn!(order_id = %failure.order_id, error = %failure.error, "reconciliation during cancel failed");
        }

        if let Some(idx) = self.index_of(id) {
            if self.mapping.canceled_order.matches(&response) {
                self.retire(idx, OrderStatus::Canceled, true);
            }
        }

        self.order(id)
            .cloned()
            .ok_or_else(|| BrokerError::UnknownOrder(id.clone()))
    }

    /// One reconciliation pass over a snapshot of the open orders.
    ///
    /// A failed read aborts only that order for this pass; it stays open and
    /// is retried on the next tick. State applied to other orders is kept.
    pub fn tick(&mut self) -> TickReport {
        let ids: Vec<OrderId> = self.open.iter().map(|o| o.id.clone()).collect();
        let mut report = TickReport::default();

        for id in ids {
            report.visited += 1;
            match self.reconcile(&id) {
                Ok(outcome) => {
                    report.fills += outcome.fills;
                    if let Some(status) = outcome.retired {
                        report.retired.push((id, status));
                    }
                }
                Err(error) => {
                    warn!(order_id = %id, %error, "order reconciliation failed");
                    report.failures.push(TickFailure { order_id: id, error });
                }
            }
        }

        report
    }

    fn reconcile(&mut self, id: &OrderId) -> Result<Reconciled, ExchangeError> {
        let Some(order) = self.open_order(id) else {
            return Ok(Reconciled::default());
        };
        debug!(order_id = %id, "fetching order");
        let raw = self.store.client().fetch_order(id, &order.instrument)?;
        self.apply_observation(id, &raw)
    }

    /// Apply one exchange read of an open order.
    fn apply_observation(&mut self, id: &OrderId, raw: &RawOrder) -> Result<Reconciled, ExchangeError> {
        let Some(idx) = self.index_of(id) else {
            return Ok(Reconciled::default());
        };
        let detected = detect_fills(
            &self.open[idx],
            raw,
            self.mapping.fill_policy,
            &self.mapping.closed_order,
        )?;

        let mut outcome = Reconciled::default();
        let order = &mut self.open[idx];
        order.exchange_status = raw.status().map(str::to_string);

        for d in detected {
            let (size, price) = (d.fill.size, d.fill.price);
            if !order.apply_fill(d.fill, d.source) {
                continue;
            }
            order.status = d.status;
            self.positions.update(&order.instrument, size, price);
            outcome.fills += 1;
            debug!(order_id = %id, size, price, status = ?order.status, "fill applied");

            if self.mapping.balance_refresh == BalanceRefresh::EveryFill {
                if let Err(e) = self.store.refresh_balance() {
                    warn!(error = %e, "balance refresh after fill failed");
                }
            }
            self.notifications.publish(order.clone());
        }

        if self.mapping.closed_order.matches(raw) {
            let notify = order.status != OrderStatus::Filled;
            outcome.retired = Some(self.retire(idx, OrderStatus::Filled, notify));
        } else if self.mapping.canceled_order.matches(raw) {
            outcome.retired = Some(self.retire(idx, OrderStatus::Canceled, true));
        } else if self.mapping.rejected_order.matches(raw) {
            outcome.retired = Some(self.retire(idx, OrderStatus::Rejected, true));
        }

        Ok(outcome)
    }

    /// Move an open order to the finished set in its terminal state.
    fn retire(&mut self, idx: usize, status: OrderStatus, notify: bool) -> OrderStatus {
        let mut order = self.open.remove(idx);
        order.status = status;
        info!(order_id = %order.id, ?status, filled = order.filled_size, "order retired");
        if notify {
            self.notifications.publish(order.clone());
        }
        self.finished.insert(order.id.clone(), order);
        status
    }

    fn index_of(&self, id: &OrderId) -> Option<usize> {
        self.open.iter().position(|o| &o.id == id)
    }

    fn open_order(&self, id: &OrderId) -> Option<&TrackedOrder> {
        self.open.iter().find(|o| &o.id == id)
    }

    /// Open orders in submission order.
    pub fn open_orders(&self) -> &[TrackedOrder] {
        &self.open
    }

    /// Current state of an open or retired order.
    pub fn order(&self, id: &OrderId) -> Option<&TrackedOrder> {
        self.open_order(id).or_else(|| self.finished.get(id))
    }

    /// Orders the exchange reports open, including ones placed elsewhere.
    pub fn open_orders_on_exchange(&self) -> Result<Vec<RawOrder>, BrokerError> {
        Ok(self.store.fetch_open_orders()?)
    }

    // ── Notifications and positions ────────────────────────────────────

    pub fn get_notification(&self) -> Option<TrackedOrder> {
        self.notifications.poll()
    }

    /// Handle onto the order notification queue.
    pub fn notifications(&self) -> NotificationChannel<TrackedOrder> {
        self.notifications.clone()
    }

    pub fn position(&self, instrument: &str) -> Position {
        self.positions.get(instrument)
    }

    pub fn positions(&self) -> &PositionStore {
        &self.positions
    }

    // ── Account ────────────────────────────────────────────────────────

    /// Cached cash; no request is made.
    pub fn cash(&self) -> f64 {
        self.store.cached_balance().cash
    }

    /// Cached account value; no request is made.
    pub fn value(&self) -> f64 {
        self.store.cached_balance().value
    }

    pub fn refresh_balance(&self) -> Result<CashValue, BrokerError> {
        Ok(self.store.refresh_balance()?)
    }

    pub fn wallet_balance(
        &self,
        currencies: &[&str],
        params: &Params,
    ) -> Result<BTreeMap<String, WalletBalance>, BrokerError> {
        Ok(self.store.wallet_balance(currencies, params)?)
    }

    pub fn private_end_point(
        &self,
        kind: &str,
        endpoint: &str,
        params: &Params,
    ) -> Result<Value, BrokerError> {
        Ok(self.store.private_end_point(kind, endpoint, params)?)
    }
}
