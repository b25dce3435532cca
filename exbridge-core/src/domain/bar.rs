//! Bar: one OHLCV candle as delivered by the feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw candle row as returned by `fetch_ohlcv`:
/// `[timestamp_ms, open, high, low, close, volume]`, any of which may be null.
pub type OhlcvRow = [Option<f64>; 6];

/// OHLCV candle keyed by its opening timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Build a bar from a raw row. Returns `None` if any field is null.
    pub fn from_row(row: &OhlcvRow) -> Option<Self> {
        let [ts, open, high, low, close, volume] = *row;
        Some(Self {
            timestamp_ms: ts? as i64,
            open: open?,
            high: high?,
            low: low?,
            close: close?,
            volume: volume?,
        })
    }

    /// UTC datetime of the bar's open. Falls back to the epoch for out-of-range stamps.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp_ms).unwrap_or_default()
    }

    /// Basic OHLC sanity check: high bounds everything, low is bounded by everything.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }
}
