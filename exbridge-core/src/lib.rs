//! Exbridge Core: connects a trading engine to an exchange.
//!
//! This crate contains:
//! - Domain types (bars, orders, fills, positions)
//! - The exchange client contract plus a scripted replay exchange
//! - The exchange store holding the shared client, currency and cached balance
//! - The broker: order submission, cancellation and per-tick fill reconciliation
//! - The bar feed: paginated OHLCV backfill followed by live polling
//! - Configuration loading (TOML or JSON)

pub mod broker;
pub mod config;
pub mod domain;
pub mod exchange;
pub mod feed;
pub mod notify;
pub mod store;

pub use broker::{Broker, BrokerError, BrokerMapping, OrderRequest, TickReport};
pub use config::{BridgeConfig, ConfigError};
pub use exchange::{ExchangeClient, ExchangeError, ReplayExchange};
pub use feed::{BarFeed, DataStatus, FeedConfig, FeedError, Pull, StreamState};
pub use store::ExchangeStore;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: shared and notified types can cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::TrackedOrder>();
        require_sync::<domain::TrackedOrder>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();

        require_send::<ExchangeStore>();
        require_sync::<ExchangeStore>();
        require_send::<ReplayExchange>();
        require_sync::<ReplayExchange>();
        require_send::<notify::NotificationChannel<domain::TrackedOrder>>();
        require_sync::<notify::NotificationChannel<domain::TrackedOrder>>();

        require_send::<Broker>();
        require_send::<BarFeed>();
    }
}
