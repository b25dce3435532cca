//! OHLCV bar feed.
//!
//! Turns the paginated "candles since timestamp" primitive into a gap-free,
//! duplicate-free stream: backfill from a start time, then tail live data.
//!
//! States: `Backfilling` → `Live`, or `Backfilling` → `Finished` in
//! historical-only mode. Without a start time the feed starts `Live`.

pub mod bar_feed;

pub use bar_feed::BarFeed;

use crate::domain::Bar;
use crate::exchange::{ExchangeError, Params, TimeFrame};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Smallest page requested from the exchange. Edge candles of a page may be
/// dropped (the `since` duplicate and a still-forming newest candle), so a
/// page must hold at least one candle in between.
pub const MIN_PAGE_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamState {
    Backfilling,
    Live,
    Finished,
}

/// Connectivity notifications published by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataStatus {
    /// Serving historical (backfill) data.
    Delayed,
    Live,
    /// Historical-only stream exhausted.
    Disconnected,
}

/// Result of one `pull()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pull {
    Bar(Bar),
    /// Nothing buffered yet; pull again later.
    NoDataYet,
    EndOfStream,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("feed used before start()")]
    NotStarted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub symbol: String,
    pub timeframe: TimeFrame,
    pub compression: u32,
    /// Backfill start; `None` goes live immediately.
    pub from: Option<DateTime<Utc>>,
    /// Stop after the backfill instead of going live.
    pub historical: bool,
    /// Page size; floored at `MIN_PAGE_SIZE`.
    pub ohlcv_limit: usize,
    /// Discard the newest candle of every page (exchanges that return an
    /// in-progress candle).
    pub drop_newest: bool,
    pub fetch_ohlcv_params: Params,
    /// Minimum time between live fetches.
    pub refresh_interval_secs: u64,
    /// How long a pull waits on an empty buffer.
    pub dequeue_timeout_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            timeframe: TimeFrame::Minutes,
            compression: 1,
            from: None,
            historical: false,
            ohlcv_limit: 20,
            drop_newest: false,
            fetch_ohlcv_params: Params::new(),
            refresh_interval_secs: 60,
            dequeue_timeout_ms: 1000,
        }
    }
}

impl FeedConfig {
    pub fn new(symbol: impl Into<String>, timeframe: TimeFrame, compression: u32) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            compression,
            ..Self::default()
        }
    }

    pub fn page_size(&self) -> usize {
        self.ohlcv_limit.max(MIN_PAGE_SIZE)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_floored() {
        let mut cfg = FeedConfig::new("BNB/USDT", TimeFrame::Minutes, 1);
        cfg.ohlcv_limit = 1;
        assert_eq!(cfg.page_size(), 3);
        cfg.ohlcv_limit = 1000;
        assert_eq!(cfg.page_size(), 1000);
    }

    #[test]
    fn defaults() {
        let cfg = FeedConfig::default();
        assert_eq!(cfg.ohlcv_limit, 20);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(60));
        assert_eq!(cfg.dequeue_timeout(), Duration::from_secs(1));
        assert!(!cfg.historical);
    }
}
