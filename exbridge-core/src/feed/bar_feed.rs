//! The bar streaming state machine.

use super::{DataStatus, FeedConfig, FeedError, Pull, StreamState};
use crate::domain::{Bar, OhlcvRow};
use crate::notify::NotificationChannel;
use crate::store::ExchangeStore;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

/// Streams OHLCV bars for one symbol from an exchange store.
///
/// Bars are buffered in timestamp order and handed out one per `pull()`.
/// Only candles strictly newer than the last buffered one are ever queued,
/// so overlapping fetches never duplicate output.
pub struct BarFeed {
    store: Arc<ExchangeStore>,
    config: FeedConfig,
    state: Option<StreamState>,
    granularity: Option<String>,
    tx: Sender<Bar>,
    rx: Receiver<Bar>,
    buffered: usize,
    /// Timestamp (ms) of the newest candle queued so far.
    last_ts: i64,
    last_refresh: Option<Instant>,
    notifications: NotificationChannel<DataStatus>,
}

impl BarFeed {
    pub fn new(store: Arc<ExchangeStore>, config: FeedConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            store,
            config,
            state: None,
            granularity: None,
            tx,
            rx,
            buffered: 0,
            last_ts: Utc::now().timestamp_millis(),
            last_refresh: None,
            notifications: NotificationChannel::new(),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Current state; `None` until `start()`.
    pub fn state(&self) -> Option<StreamState> {
        self.state
    }

    pub fn last_timestamp(&self) -> i64 {
        self.last_ts
    }

    /// Bars buffered and not yet pulled.
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    /// Whether the stream goes live after the backfill.
    pub fn is_live(&self) -> bool {
        !self.config.historical
    }

    pub fn has_live_data(&self) -> bool {
        self.state == Some(StreamState::Live) && self.buffered > 0
    }

    pub fn get_notification(&self) -> Option<DataStatus> {
        self.notifications.poll()
    }

    pub fn notifications(&self) -> NotificationChannel<DataStatus> {
        self.notifications.clone()
    }

    /// Begin streaming. With a start time the feed backfills from it first;
    /// without one it goes live from now.
    pub fn start(&mut self, from: Option<DateTime<Utc>>) -> Result<(), FeedError> {
        let granularity = self
            .store
            .granularity(self.config.timeframe, self.config.compression)?;
        self.granularity = Some(granularity);

        match from {
            Some(from) => {
                self.set_state(StreamState::Backfilling, DataStatus::Delayed);
                self.fetch_and_buffer(Some(from), false)?;
            }
            None => self.set_state(StreamState::Live, DataStatus::Live),
        }
        Ok(())
    }

    /// Next bar, `NoDataYet` if none is ready, or `EndOfStream`.
    pub fn pull(&mut self) -> Result<Pull, FeedError> {
        loop {
            match self.state.ok_or(FeedError::NotStarted)? {
                StreamState::Finished => return Ok(Pull::EndOfStream),
                StreamState::Live => {
                    let due = self
                        .last_refresh
                        .map_or(true, |t| t.elapsed() >= self.config.refresh_interval());
                    if due {
                        self.last_refresh = Some(Instant::now());
                        self.fetch_and_buffer(None, true)?;
                    }
                    return Ok(self.dequeue().map_or(Pull::NoDataYet, Pull::Bar));
                }
                StreamState::Backfilling => {
                    if let Some(bar) = self.dequeue() {
                        return Ok(Pull::Bar(bar));
                    }
                    if self.config.historical {
                        self.set_state(StreamState::Finished, DataStatus::Disconnected);
                        return Ok(Pull::EndOfStream);
                    }
                    self.set_state(StreamState::Live, DataStatus::Live);
                }
            }
        }
    }

    /// Fetch pages of candles since the last seen timestamp and queue the new
    /// ones. Backfill keeps paging until a page adds nothing; live mode makes
    /// exactly one request. Returns the number of bars queued.
    pub fn fetch_and_buffer(
        &mut self,
        from: Option<DateTime<Utc>>,
        live: bool,
    ) -> Result<usize, FeedError> {
        let granularity = match &self.granularity {
            Some(g) => g.clone(),
            None => self
                .store
                .granularity(self.config.timeframe, self.config.compression)?,
        };
        if let Some(from) = from {
            self.last_ts = from.timestamp_millis();
        }

        let limit = self.config.page_size();
        let mut total = 0;
        loop {
            let mut rows = self.store.client().fetch_ohlcv(
                &self.config.symbol,
                &granularity,
                Some(self.last_ts),
                limit,
                &self.config.fetch_ohlcv_params,
            )?;
            rows.sort_by(by_timestamp);
            if self.config.drop_newest {
                rows.pop();
            }

            let added = self.buffer_rows(&rows);
            total += added;
            debug!(
                symbol = %self.config.symbol,
                fetched = rows.len(),
                added,
                last_ts = self.last_ts,
                live,
                "ohlcv page"
            );

            if added == 0 || live {
                break;
            }
        }
        Ok(total)
    }

    fn buffer_rows(&mut self, rows: &[OhlcvRow]) -> usize {
        let mut added = 0;
        for row in rows {
            let Some(bar) = Bar::from_row(row) else {
                trace!(?row, "dropping candle with null field");
                continue;
            };
            if bar.timestamp_ms > self.last_ts && self.tx.send(bar).is_ok() {
                self.buffered += 1;
                self.last_ts = bar.timestamp_ms;
                added += 1;
            }
        }
        added
    }

    fn dequeue(&mut self) -> Option<Bar> {
        let bar = self.rx.recv_timeout(self.config.dequeue_timeout()).ok()?;
        self.buffered -= 1;
        Some(bar)
    }

    fn set_state(&mut self, state: StreamState, status: DataStatus) {
        info!(symbol = %self.config.symbol, ?state, "feed state");
        self.state = Some(state);
        self.notifications.publish(status);
    }
}

fn by_timestamp(a: &OhlcvRow, b: &OhlcvRow) -> Ordering {
    a[0].partial_cmp(&b[0]).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ExchangeCall, ReplayExchange, TimeFrame};

    const MIN: i64 = 60_000;
    const T0: i64 = 1_700_000_000_000 - 1_700_000_000_000 % MIN;

    fn candle(ts: i64) -> OhlcvRow {
        [Some(ts as f64), Some(1.0), Some(2.0), Some(0.5), Some(1.5), Some(3.0)]
    }

    fn feed(historical: bool) -> (Arc<ReplayExchange>, BarFeed) {
        let ex = Arc::new(ReplayExchange::default());
        let store = Arc::new(ExchangeStore::new(ex.clone(), "USDT"));
        let mut cfg = FeedConfig::new("BTC/USDT", TimeFrame::Minutes, 1);
        cfg.historical = historical;
        cfg.ohlcv_limit = 4;
        cfg.refresh_interval_secs = 0;
        cfg.dequeue_timeout_ms = 0;
        (ex, BarFeed::new(store, cfg))
    }

    fn from() -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(T0)
    }

    #[test]
    fn pull_before_start_is_an_error() {
        let (_, mut feed) = feed(true);
        assert!(matches!(feed.pull(), Err(FeedError::NotStarted)));
    }

    #[test]
    fn backfill_pages_until_exhausted() {
        let (ex, mut feed) = feed(true);
        ex.push_candles((0..10).map(|i| candle(T0 + i * MIN)));
        feed.start(from()).unwrap();

        // T0 itself equals the start stamp and is not newer than it.
        assert_eq!(feed.buffered(), 9);
        assert_eq!(feed.last_timestamp(), T0 + 9 * MIN);
        let pages = ex.count_calls(|c| matches!(c, ExchangeCall::FetchOhlcv { .. }));
        assert!(pages >= 3, "expected paging, got {pages} requests");
    }

    #[test]
    fn null_candles_are_dropped() {
        let (ex, mut feed) = feed(true);
        let mut broken = candle(T0 + 2 * MIN);
        broken[4] = None;
        ex.push_candles([candle(T0 + MIN), broken, candle(T0 + 3 * MIN)]);
        feed.start(from()).unwrap();

        let mut stamps = Vec::new();
        while let Pull::Bar(bar) = feed.pull().unwrap() {
            stamps.push(bar.timestamp_ms);
        }
        assert_eq!(stamps, vec![T0 + MIN, T0 + 3 * MIN]);
    }

    #[test]
    fn drop_newest_discards_forming_candle() {
        let (ex, mut feed) = feed(true);
        feed.config.drop_newest = true;
        ex.push_candles((1..=3).map(|i| candle(T0 + i * MIN)));
        feed.start(from()).unwrap();
        assert_eq!(feed.last_timestamp(), T0 + 2 * MIN);
    }

    #[test]
    fn live_start_publishes_live() {
        let (_, mut feed) = feed(false);
        feed.start(None).unwrap();
        assert_eq!(feed.state(), Some(StreamState::Live));
        assert_eq!(feed.get_notification(), Some(DataStatus::Live));
        assert_eq!(feed.pull().unwrap(), Pull::NoDataYet);
    }

    #[test]
    fn live_fetch_makes_one_request() {
        let (ex, mut feed) = feed(false);
        feed.start(None).unwrap();
        let now = feed.last_timestamp();
        ex.push_candles((1..=10).map(|i| candle(now + i * MIN)));
        ex.clear_calls();

        let added = feed.fetch_and_buffer(None, true).unwrap();
        assert_eq!(added, 4);
        assert_eq!(ex.calls().len(), 1);
    }
}
