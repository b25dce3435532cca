use serde::{Deserialize, Serialize};

/// Bar timeframe unit; combined with a compression factor it names a granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrame {
    Minutes,
    Days,
    Weeks,
    Months,
    Years,
}

/// Standard unified-API timeframe strings.
pub fn standard(timeframe: TimeFrame, compression: u32) -> Option<&'static str> {
    let s = match (timeframe, compression) {
        (TimeFrame::Minutes, 1) => "1m",
        (TimeFrame::Minutes, 3) => "3m",
        (TimeFrame::Minutes, 5) => "5m",
        (TimeFrame::Minutes, 15) => "15m",
        (TimeFrame::Minutes, 30) => "30m",
        (TimeFrame::Minutes, 60) => "1h",
        (TimeFrame::Minutes, 90) => "90m",
        (TimeFrame::Minutes, 120) => "2h",
        (TimeFrame::Minutes, 180) => "3h",
        (TimeFrame::Minutes, 240) => "4h",
        (TimeFrame::Minutes, 360) => "6h",
        (TimeFrame::Minutes, 480) => "8h",
        (TimeFrame::Minutes, 720) => "12h",
        (TimeFrame::Days, 1) => "1d",
        (TimeFrame::Days, 3) => "3d",
        (TimeFrame::Weeks, 1) => "1w",
        (TimeFrame::Weeks, 2) => "2w",
        (TimeFrame::Months, 1) => "1M",
        (TimeFrame::Months, 3) => "3M",
        (TimeFrame::Months, 6) => "6M",
        (TimeFrame::Years, 1) => "1y",
        _ => return None,
    };
    Some(s)
}
