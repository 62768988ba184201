use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("candle at index {index} is older than its predecessor")]
    OutOfOrder { index: usize },
    #[error("candle at index {index} repeats the timestamp of its predecessor")]
    DuplicateTimestamp { index: usize },
}

/// Time-ascending run of candles with no repeated timestamps.
///
/// The ordering is checked once at construction; the series is read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(candles: Vec<Candle>) -> Result<Self, SeriesError> {
        for (index, pair) in candles.windows(2).enumerate() {
            if pair[1].timestamp == pair[0].timestamp {
                return Err(SeriesError::DuplicateTimestamp { index: index + 1 });
            }
            if pair[1].timestamp < pair[0].timestamp {
                return Err(SeriesError::OutOfOrder { index: index + 1 });
            }
        }
        Ok(Self { candles })
    }

    /// Sorts by timestamp and keeps the first bar of every repeated timestamp.
    pub fn from_unsorted(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
        Self { candles }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    /// The most recent `n` bars (or all of them when shorter).
    pub fn tail(&self, n: usize) -> Self {
        let start = self.candles.len().saturating_sub(n);
        Self { candles: self.candles[start..].to_vec() }
    }
}

// Variants are declared from finest to coarsest so `Ord` follows bar duration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeFrame {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "2h")]
    Hour2,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "6h")]
    Hour6,
    #[serde(rename = "8h")]
    Hour8,
    #[serde(rename = "12h")]
    Hour12,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
}

impl TimeFrame {
    pub const ALL: [TimeFrame; 12] = [
        TimeFrame::Minute1,
        TimeFrame::Minute5,
        TimeFrame::Minute15,
        TimeFrame::Minute30,
        TimeFrame::Hour1,
        TimeFrame::Hour2,
        TimeFrame::Hour4,
        TimeFrame::Hour6,
        TimeFrame::Hour8,
        TimeFrame::Hour12,
        TimeFrame::Day1,
        TimeFrame::Week1,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TimeFrame::Minute1 => "1m",
            TimeFrame::Minute5 => "5m",
            TimeFrame::Minute15 => "15m",
            TimeFrame::Minute30 => "30m",
            TimeFrame::Hour1 => "1h",
            TimeFrame::Hour2 => "2h",
            TimeFrame::Hour4 => "4h",
            TimeFrame::Hour6 => "6h",
            TimeFrame::Hour8 => "8h",
            TimeFrame::Hour12 => "12h",
            TimeFrame::Day1 => "1d",
            TimeFrame::Week1 => "1w",
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown timeframe '{0}'")]
pub struct UnknownTimeFrame(pub String);

impl FromStr for TimeFrame {
    type Err = UnknownTimeFrame;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeFrame::ALL
            .iter()
            .copied()
            .find(|tf| tf.label() == s.trim())
            .ok_or_else(|| UnknownTimeFrame(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

/// Result of a successful market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub entry_price: f64,
    pub quantity: f64,
    pub opened_at: DateTime<Utc>,
    pub reason: String,
}

/// Append-only trade log entry. `realized_pnl` and `pnl_pct` are only set on sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub realized_pnl: Option<f64>,
    pub pnl_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub price: f64,
    pub volume: f64,
    /// Raw Wilder RSI, before normalization.
    pub rsi: f64,
    pub rsi_normalized: f64,
    pub volatility: f64,
    pub combined: f64,
}

impl ScoreComponents {
    pub const FACTORS: [&'static str; 6] =
        ["price", "volume", "rsi", "rsi_normalized", "volatility", "combined"];

    pub fn get(&self, factor: &str) -> Option<f64> {
        match factor {
            "price" => Some(self.price),
            "volume" => Some(self.volume),
            "rsi" => Some(self.rsi),
            "rsi_normalized" => Some(self.rsi_normalized),
            "volatility" => Some(self.volatility),
            "combined" => Some(self.combined),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        Self::FACTORS
            .iter()
            .filter_map(move |name| self.get(name).map(|v| (*name, v)))
    }
}

/// Composite score of one timeframe, with the number of bars it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeframeScore {
    pub combined: f64,
    pub components: ScoreComponents,
    pub samples: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotPhase {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Point-in-time view of the bot handed to the dashboard/CLI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotStatus {
    pub running: bool,
    pub phase: BotPhase,
    pub active_symbols: Vec<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub last_scores: BTreeMap<String, f64>,
    pub positions: Vec<Position>,
    pub realized_pnl: f64,
    pub quote_balance: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle_at(secs: i64, close: f64) -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_series_rejects_duplicate_timestamp() {
        let err = CandleSeries::new(vec![candle_at(1, 1.0), candle_at(1, 2.0)]).unwrap_err();
        assert_eq!(err, SeriesError::DuplicateTimestamp { index: 1 });
    }

    #[test]
    fn test_series_rejects_out_of_order() {
        let err = CandleSeries::new(vec![candle_at(2, 1.0), candle_at(3, 1.0), candle_at(1, 1.0)])
            .unwrap_err();
        assert_eq!(err, SeriesError::OutOfOrder { index: 2 });
    }

    #[test]
    fn test_series_from_unsorted_sorts_and_dedups() {
        let series = CandleSeries::from_unsorted(vec![
            candle_at(3, 3.0),
            candle_at(1, 1.0),
            candle_at(3, 9.0),
            candle_at(2, 2.0),
        ]);
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.last_close(), Some(3.0));
    }

    #[test]
    fn test_series_tail() {
        let series = CandleSeries::new((0..5).map(|i| candle_at(i, i as f64)).collect()).unwrap();
        assert_eq!(series.tail(2).closes(), vec![3.0, 4.0]);
        assert_eq!(series.tail(10).len(), 5);
        assert!(CandleSeries::empty().tail(3).is_empty());
    }

    #[test]
    fn test_timeframe_labels_round_trip_through_from_str() {
        for tf in TimeFrame::ALL {
            assert_eq!(tf.label().parse::<TimeFrame>().unwrap(), tf);
        }
        assert!("3h".parse::<TimeFrame>().is_err());
        assert!(TimeFrame::Minute1 < TimeFrame::Hour1);
    }

    #[test]
    fn test_timeframe_serializes_as_label() {
        assert_eq!(serde_json::to_string(&TimeFrame::Hour4).unwrap(), "\"4h\"");
        let tf: TimeFrame = serde_json::from_str("\"1w\"").unwrap();
        assert_eq!(tf, TimeFrame::Week1);
    }

    #[test]
    fn test_score_components_named_access() {
        let components = ScoreComponents {
            price: 80.0,
            volume: 40.0,
            rsi: 65.0,
            rsi_normalized: 55.0,
            volatility: 50.0,
            combined: 72.0,
        };
        assert_eq!(components.get("rsi"), Some(65.0));
        assert_eq!(components.get("momentum"), None);
        let names: Vec<&str> = components.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ScoreComponents::FACTORS.to_vec());

        let json = serde_json::to_value(components).unwrap();
        assert_eq!(json["rsi_normalized"], 55.0);
    }

    #[test]
    fn test_side_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"SELL\"");
        assert_eq!(Side::Buy.to_string(), "BUY");
    }
}
