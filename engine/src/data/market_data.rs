// In-memory candle history per symbol and timeframe
use crate::data::csv_parser::CandleCsvParser;
use crate::error::EngineError;
use shared::models::{Candle, CandleSeries, TimeFrame};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub struct MarketDataStore {
    data: HashMap<String, BTreeMap<TimeFrame, CandleSeries>>,
}

impl MarketDataStore {
    pub fn new() -> Self {
        MarketDataStore { data: HashMap::new() }
    }

    /// Builds a store from every `<SYMBOL>_<timeframe>.csv` in `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, EngineError> {
        let mut store = Self::new();
        for (symbol, timeframe, path) in CandleCsvParser::discover(dir)? {
            let candles = CandleCsvParser::load_candles_from_csv(&path, &symbol)?;
            tracing::info!(symbol = %symbol, %timeframe, count = candles.len(), path = %path.display(), "Loaded candles");
            store.add_candles(&symbol, timeframe, candles);
        }
        Ok(store)
    }

    /// Merges `new_candles` into the stored history. On a repeated timestamp the bar
    /// already stored wins.
    pub fn add_candles(&mut self, symbol: &str, timeframe: TimeFrame, new_candles: Vec<Candle>) {
        let symbol_data = self.data.entry(symbol.to_string()).or_default();
        let mut merged = symbol_data
            .get(&timeframe)
            .map(|s| s.candles().to_vec())
            .unwrap_or_default();
        merged.extend(new_candles);
        symbol_data.insert(timeframe, CandleSeries::from_unsorted(merged));
    }

    /// The most recent `limit` candles. Unknown symbol/timeframe pairs yield `None`.
    pub fn get_candles(&self, symbol: &str, timeframe: TimeFrame, limit: usize) -> Option<CandleSeries> {
        self.data
            .get(symbol)
            .and_then(|symbol_data| symbol_data.get(&timeframe))
            .map(|series| series.tail(limit))
    }

    /// Latest close on the finest timeframe loaded for `symbol`.
    pub fn latest_close(&self, symbol: &str) -> Option<f64> {
        self.data
            .get(symbol)?
            .values()
            .find_map(|series| series.last_close())
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn timeframes(&self, symbol: &str) -> Vec<TimeFrame> {
        self.data
            .get(symbol)
            .map(|d| d.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for MarketDataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn candle(symbol: &str, hour: i64, close: f64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timestamp: Utc.timestamp_opt(hour * 3600, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_add_and_get_candles() {
        let mut store = MarketDataStore::new();
        store.add_candles("BTCUSDT", TimeFrame::Hour1, vec![candle("BTCUSDT", 2, 2.0), candle("BTCUSDT", 1, 1.0)]);
        store.add_candles("BTCUSDT", TimeFrame::Hour1, vec![candle("BTCUSDT", 3, 3.0), candle("BTCUSDT", 2, 9.0)]);

        let series = store.get_candles("BTCUSDT", TimeFrame::Hour1, 100).unwrap();
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
        assert_eq!(store.get_candles("BTCUSDT", TimeFrame::Hour1, 2).unwrap().closes(), vec![2.0, 3.0]);
        assert!(store.get_candles("BTCUSDT", TimeFrame::Day1, 100).is_none());
        assert!(store.get_candles("ETHUSDT", TimeFrame::Hour1, 100).is_none());
    }

    #[test]
    fn test_latest_close_prefers_finest_timeframe() {
        let mut store = MarketDataStore::new();
        store.add_candles("ETHUSDT", TimeFrame::Day1, vec![candle("ETHUSDT", 0, 3000.0)]);
        store.add_candles("ETHUSDT", TimeFrame::Minute5, vec![candle("ETHUSDT", 1, 3100.0)]);
        assert_eq!(store.latest_close("ETHUSDT"), Some(3100.0));
        assert_eq!(store.latest_close("BTCUSDT"), None);
        assert_eq!(store.timeframes("ETHUSDT"), vec![TimeFrame::Minute5, TimeFrame::Day1]);
    }

    #[test]
    fn test_load_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("SOLUSDT_1h.csv"),
            "timestamp,open,high,low,close,volume\n3600000,10,11,9,10.5,100\n0,10,10,10,10,50\n",
        )
        .unwrap();
        let store = MarketDataStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.symbols(), vec!["SOLUSDT".to_string()]);
        let series = store.get_candles("SOLUSDT", TimeFrame::Hour1, 10).unwrap();
        assert_eq!(series.closes(), vec![10.0, 10.5]);
    }
}
