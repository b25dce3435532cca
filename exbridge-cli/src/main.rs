//! Exbridge CLI: replay recorded candles through the bar feed and check configs.
//!
//! Commands:
//! - `stream`: load a candle CSV into a replay exchange and stream it through the feed
//! - `check-config`: load, validate and print a bridge config

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use exbridge_core::domain::{Bar, OhlcvRow};
use exbridge_core::exchange::ReplayExchange;
use exbridge_core::feed::{BarFeed, Pull};
use exbridge_core::store::ExchangeStore;
use exbridge_core::BridgeConfig;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "exbridge", about = "Exbridge CLI: exchange order/bar bridge tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream candles from a CSV file (timestamp_ms,open,high,low,close,volume) through the feed.
    Stream {
        /// Candle file; empty cells are treated as missing values.
        #[arg(long)]
        candles: PathBuf,

        /// Bridge config (.toml or .json). Defaults are used when absent.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbol override.
        #[arg(long)]
        symbol: Option<String>,

        /// Backfill start (RFC 3339 or YYYY-MM-DD). Defaults to the config value,
        /// then to just before the first candle in the file.
        #[arg(long)]
        from: Option<String>,

        /// Stop once the backfill is exhausted.
        #[arg(long, default_value_t = false)]
        historical: bool,

        /// Give up after this many pulls without reaching end of stream.
        #[arg(long, default_value_t = 100)]
        max_polls: usize,
    },
    /// Load and validate a bridge config, then print the effective settings as TOML.
    CheckConfig {
        /// Path to a .toml or .json config.
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "exbridge_core=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Stream {
            candles,
            config,
            symbol,
            from,
            historical,
            max_polls,
        } => run_stream(&candles, config.as_deref(), symbol, from, historical, max_polls),
        Commands::CheckConfig { path } => run_check_config(&path),
    }
}

fn run_stream(
    candles_path: &Path,
    config_path: Option<&Path>,
    symbol: Option<String>,
    from: Option<String>,
    historical: bool,
    max_polls: usize,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(symbol) = symbol {
        config.feed.symbol = symbol;
    }
    if config.feed.symbol.is_empty() {
        config.feed.symbol = "REPLAY".into();
    }
    config.feed.historical |= historical;

    let rows = read_candles(candles_path)?;
    let start = match from.as_deref() {
        Some(s) => Some(parse_start(s)?),
        None => config.feed.from.or_else(|| {
            rows.iter()
                .filter_map(|r| r[0])
                .map(|ts| ts as i64)
                .min()
                .and_then(|first| DateTime::from_timestamp_millis(first - 1))
        }),
    };
    info!(file = %candles_path.display(), rows = rows.len(), ?start, "loaded candles");

    let exchange = Arc::new(ReplayExchange::new(config.exchange.name.clone()));
    exchange.push_candles(rows);
    let store = Arc::new(ExchangeStore::new(exchange, config.exchange.currency.clone()));
    let mut feed = BarFeed::new(store, config.feed.clone());
    let statuses = feed.notifications();

    let mut out = csv::Writer::from_writer(io::stdout());
    out.write_record(["datetime", "open", "high", "low", "close", "volume"])?;

    feed.start(start)?;
    let mut emitted = 0usize;
    for _ in 0..max_polls {
        let pull = feed.pull()?;
        for status in statuses.drain() {
            eprintln!("status: {status:?}");
        }
        match pull {
            Pull::Bar(bar) => {
                write_bar(&mut out, &bar)?;
                emitted += 1;
            }
            Pull::NoDataYet => {}
            Pull::EndOfStream => break,
        }
    }
    out.flush()?;

    eprintln!(
        "{emitted} bars emitted, state {}",
        feed.state().map_or("not started".to_string(), |s| format!("{s:?}"))
    );
    Ok(())
}

fn run_check_config(path: &Path) -> Result<()> {
    let config = BridgeConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Read `timestamp_ms,open,high,low,close,volume` rows. A header row is
/// skipped; unparsable or empty cells become missing values.
fn read_candles(path: &Path) -> Result<Vec<OhlcvRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() < 6 {
            bail!("{}:{}: expected 6 columns, got {}", path.display(), line + 1, record.len());
        }
        let mut row: OhlcvRow = [None; 6];
        for (cell, value) in row.iter_mut().zip(record.iter()) {
            *cell = value.parse::<f64>().ok();
        }
        if line == 0 && row[0].is_none() {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

fn parse_start(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid start time {s:?}"))?;
    Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
}

fn write_bar<W: io::Write>(out: &mut csv::Writer<W>, bar: &Bar) -> Result<()> {
    out.write_record([
        bar.datetime().to_rfc3339(),
        bar.open.to_string(),
        bar.high.to_string(),
        bar.low.to_string(),
        bar.close.to_string(),
        bar.volume.to_string(),
    ])?;
    Ok(())
}
