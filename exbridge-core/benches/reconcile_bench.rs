//! Criterion benchmarks for the reconciliation hot paths.
//!
//! Benchmarks:
//! 1. Broker tick over many open orders against the replay exchange
//! 2. Trade-list fill detection on large trade lists
//! 3. Feed backfill through small pages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use exbridge_core::broker::{
    detect_fills, BalanceRefresh, Broker, BrokerMapping, FillPolicy, OrderRequest, StatusPredicate,
};
use exbridge_core::domain::{ExecType, OrderId, OrderSide, TrackedOrder};
use exbridge_core::exchange::{RawOrder, ReplayExchange, TimeFrame};
use exbridge_core::feed::{BarFeed, FeedConfig, Pull};
use exbridge_core::store::ExchangeStore;
use serde_json::json;
use std::sync::Arc;

// ── Helpers ──────────────────────────────────────────────────────────

fn broker_with_open_orders(n: usize) -> Broker {
    let ex = Arc::new(ReplayExchange::default());
    let store = Arc::new(ExchangeStore::new(ex.clone(), "USDT"));
    let mapping = BrokerMapping::default().with_balance_refresh(BalanceRefresh::Manual);
    let mut broker = Broker::new(store, mapping);
    for i in 0..n {
        ex.script_create(json!({"id": i.to_string(), "status": "open", "side": "buy", "amount": 1.0}));
        broker
            .submit(OrderRequest::limit("BTC/USDT", OrderSide::Buy, 1.0, 100.0))
            .unwrap();
    }
    broker
}

fn trade_list(n: usize) -> RawOrder {
    let trades: Vec<_> = (0..n)
        .map(|i| json!({"id": format!("t{i}"), "amount": 0.01, "price": 100.0 + i as f64}))
        .collect();
    RawOrder::new(json!({"id": "o", "status": "open", "trades": trades}))
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("broker_tick");
    for n in [10usize, 100, 500] {
        let mut broker = broker_with_open_orders(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| black_box(broker.tick()))
        });
    }
    group.finish();
}

fn bench_detect_fills(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_fills_trade_list");
    let closed = StatusPredicate::new("status", "closed");
    for n in [10usize, 1_000] {
        let raw = trade_list(n);
        let order = TrackedOrder::new(OrderId::new("o"), "BTC/USDT", OrderSide::Buy, ExecType::Market, 1.0, None);
        group.bench_with_input(BenchmarkId::from_parameter(n), &raw, |b, raw| {
            b.iter(|| detect_fills(black_box(&order), raw, FillPolicy::Auto, &closed).unwrap())
        });
    }
    group.finish();
}

fn bench_backfill(c: &mut Criterion) {
    const MIN: i64 = 60_000;
    let start = 1_600_000_020_000 - 1_600_000_020_000 % MIN;
    let ex = Arc::new(ReplayExchange::default());
    ex.push_candles((1..=2_000).map(|i| {
        let ts = (start + i * MIN) as f64;
        [Some(ts), Some(1.0), Some(2.0), Some(0.5), Some(1.5), Some(10.0)]
    }));
    let store = Arc::new(ExchangeStore::new(ex, "USDT"));

    c.bench_function("feed_backfill_2000_bars", |b| {
        b.iter(|| {
            let mut cfg = FeedConfig::new("BTC/USDT", TimeFrame::Minutes, 1);
            cfg.historical = true;
            cfg.ohlcv_limit = 100;
            cfg.dequeue_timeout_ms = 0;
            let mut feed = BarFeed::new(store.clone(), cfg);
            feed.start(chrono::DateTime::from_timestamp_millis(start)).unwrap();
            let mut n = 0;
            while let Ok(Pull::Bar(_)) = feed.pull() {
                n += 1;
            }
            black_box(n)
        })
    });
}

criterion_group!(benches, bench_tick, bench_detect_fills, bench_backfill);
criterion_main!(benches);
