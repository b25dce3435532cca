//! The exchange connectivity seam.
//!
//! `ExchangeClient` abstracts over a unified exchange API so the broker and the
//! feed can be driven by a live connector or by the in-memory `ReplayExchange`.
//! Transport, authentication and rate limiting live behind this trait.

pub mod granularity;
pub mod raw;
pub mod replay;

pub use granularity::TimeFrame;
pub use raw::{Balance, RawOrder, RawTrade};
pub use replay::{ExchangeCall, ReplayExchange};

use crate::domain::{OhlcvRow, OrderId, OrderSide};
use thiserror::Error;

/// Extra request parameters forwarded verbatim to the exchange.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Errors raised by exchange operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExchangeError {
    #[error("order submission rejected: {0}")]
    Submission(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("unsupported granularity: {timeframe:?} x {compression}")]
    UnsupportedGranularity { timeframe: TimeFrame, compression: u32 },

    #[error("malformed exchange response: {0}")]
    MalformedResponse(String),
}

/// Unified exchange API used by the broker and the feed.
///
/// All calls are blocking and must eventually return; retry and timeout policy
/// belong to the implementation.
pub trait ExchangeClient: Send + Sync {
    /// Exchange identifier (e.g. "binance").
    fn name(&self) -> &str;

    fn create_order(
        &self,
        symbol: &str,
        order_type: &str,
        side: OrderSide,
        amount: f64,
        price: Option<f64>,
        params: &Params,
    ) -> Result<RawOrder, ExchangeError>;

    fn fetch_order(&self, id: &OrderId, symbol: &str) -> Result<RawOrder, ExchangeError>;

    fn cancel_order(&self, id: &OrderId, symbol: &str) -> Result<RawOrder, ExchangeError>;

    /// Candles starting at `since` (inclusive, ms), at most `limit` rows.
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        since: Option<i64>,
        limit: usize,
        params: &Params,
    ) -> Result<Vec<OhlcvRow>, ExchangeError>;

    fn fetch_open_orders(&self) -> Result<Vec<RawOrder>, ExchangeError>;

    fn fetch_balance(&self, params: &Params) -> Result<Balance, ExchangeError>;

    /// Implicit (non-unified) private endpoint call; the result is returned unparsed.
    fn call_private_endpoint(
        &self,
        kind: &str,
        method: &str,
        params: &Params,
    ) -> Result<serde_json::Value, ExchangeError>;

    /// Exchange timeframe string for a timeframe/compression pair.
    fn granularity_for(
        &self,
        timeframe: TimeFrame,
        compression: u32,
    ) -> Result<String, ExchangeError> {
        granularity::standard(timeframe, compression)
            .map(str::to_string)
            .ok_or(ExchangeError::UnsupportedGranularity {
                timeframe,
                compression,
            })
    }
}
