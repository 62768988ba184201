use crate::error::EngineError;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use shared::models::{Candle, TimeFrame};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

// CSV Header: timestamp,open,high,low,close,volume
// Example Row: 1718186400000,67012.5,67190.0,66950.1,67150.2,412.77
// `timestamp` is the bar open time in epoch milliseconds, as exchange kline exports use.
#[derive(Debug, Deserialize)]
struct CandleRecord {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CandleCsvParser;

impl CandleCsvParser {
    pub fn load_candles_from_csv(file_path: &Path, symbol: &str) -> Result<Vec<Candle>, EngineError> {
        let file = File::open(file_path)?;
        Self::read_candles(BufReader::new(file), symbol)
    }

    pub fn read_candles<R: Read>(reader: R, symbol: &str) -> Result<Vec<Candle>, EngineError> {
        let mut rdr = ReaderBuilder::new().has_headers(true).trim(Trim::All).from_reader(reader);

        let mut candles = Vec::new();
        for (idx, result) in rdr.deserialize::<CandleRecord>().enumerate() {
            let line = idx + 2; // header is line 1
            let record = result?;
            candles.push(Self::to_candle(record, symbol, line)?);
        }
        Ok(candles)
    }

    fn to_candle(record: CandleRecord, symbol: &str, line: usize) -> Result<Candle, EngineError> {
        let timestamp: DateTime<Utc> = DateTime::from_timestamp_millis(record.timestamp).ok_or_else(|| {
            EngineError::CsvDataFormatError(format!("Invalid timestamp {} at line {}", record.timestamp, line))
        })?;

        for (name, value) in [
            ("open", record.open),
            ("high", record.high),
            ("low", record.low),
            ("close", record.close),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::CsvDataFormatError(format!(
                    "Error parsing '{}' at line {}: price must be positive, got {}",
                    name, line, value
                )));
            }
        }
        if !(record.volume.is_finite() && record.volume >= 0.0) {
            return Err(EngineError::CsvDataFormatError(format!(
                "Error parsing 'volume' at line {}: volume must be non-negative, got {}",
                line, record.volume
            )));
        }

        Ok(Candle {
            symbol: symbol.to_string(),
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        })
    }

    /// Candle files in `dir` named `<SYMBOL>_<timeframe>.csv`, e.g. `BTCUSDT_1h.csv`.
    /// Files that do not follow the pattern are skipped.
    pub fn discover(dir: &Path) -> Result<Vec<(String, TimeFrame, PathBuf)>, EngineError> {
        let mut found = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some((symbol, tf)) = stem.rsplit_once('_') else {
                tracing::debug!(path = %path.display(), "Skipping CSV without <SYMBOL>_<timeframe> name");
                continue;
            };
            match tf.parse::<TimeFrame>() {
                Ok(timeframe) => found.push((symbol.to_uppercase(), timeframe, path.clone())),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "Skipping CSV with unknown timeframe"),
            }
        }
        found.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn create_test_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_candles_from_csv_valid_data() {
        let csv_content = "\
timestamp,open,high,low,close,volume
1718186400000,67012.5,67190.0,66950.1,67150.2,412.77
1718190000000, 67150.2, 67300.0, 67100.0, 67280.9, 380.1";
        let tmp_file = create_test_csv(csv_content);
        let candles = CandleCsvParser::load_candles_from_csv(tmp_file.path(), "BTCUSDT").unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].symbol, "BTCUSDT");
        assert_eq!(candles[0].timestamp.timestamp_millis(), 1_718_186_400_000);
        assert_eq!(candles[0].open, 67012.5);
        assert_eq!(candles[0].close, 67150.2);
        assert_eq!(candles[0].volume, 412.77);
        assert_eq!(candles[1].high, 67300.0);
    }

    #[test]
    fn test_load_candles_from_csv_empty_file() {
        let tmp_file = create_test_csv("timestamp,open,high,low,close,volume");
        let candles = CandleCsvParser::load_candles_from_csv(tmp_file.path(), "BTCUSDT").unwrap();
        assert!(candles.is_empty());
    }

    #[test]
    fn test_load_candles_missing_file() {
        let result = CandleCsvParser::load_candles_from_csv(Path::new("non_existent_file.csv"), "BTCUSDT");
        assert!(matches!(result, Err(EngineError::IoError { .. })));
    }

    #[test]
    fn test_load_candles_from_csv_not_a_number() {
        let csv_content = "\
timestamp,open,high,low,close,volume
1718186400000,NOT_A_NUMBER,67190.0,66950.1,67150.2,412.77";
        let tmp_file = create_test_csv(csv_content);
        let result = CandleCsvParser::load_candles_from_csv(tmp_file.path(), "BTCUSDT");
        assert!(matches!(result, Err(EngineError::CsvSystemError { .. })));
    }

    #[test]
    fn test_load_candles_from_csv_missing_column() {
        let csv_content = "\
timestamp,open,high,low,close
1718186400000,1.0,1.0,1.0,1.0";
        let tmp_file = create_test_csv(csv_content);
        let result = CandleCsvParser::load_candles_from_csv(tmp_file.path(), "BTCUSDT");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_candles_from_csv_non_positive_price() {
        let csv_content = "\
timestamp,open,high,low,close,volume
1718186400000,1.0,1.0,1.0,1.0,5.0
1718190000000,1.0,1.0,1.0,0.0,5.0";
        let tmp_file = create_test_csv(csv_content);
        let err = CandleCsvParser::load_candles_from_csv(tmp_file.path(), "BTCUSDT").unwrap_err();
        assert!(matches!(err, EngineError::CsvDataFormatError(_)));
        assert!(err.to_string().contains("Error parsing 'close' at line 3"));
    }

    #[test]
    fn test_discover_candle_files() {
        let dir = TempDir::new().unwrap();
        for name in ["BTCUSDT_1h.csv", "btcusdt_1d.csv", "ETHUSDT_15m.csv", "notes.txt", "ETHUSDT_3h.csv", "plain.csv"] {
            std::fs::write(dir.path().join(name), "timestamp,open,high,low,close,volume\n").unwrap();
        }
        let found = CandleCsvParser::discover(dir.path()).unwrap();
        let keys: Vec<(String, TimeFrame)> = found.into_iter().map(|(s, tf, _)| (s, tf)).collect();
        assert_eq!(
            keys,
            vec![
                ("BTCUSDT".to_string(), TimeFrame::Hour1),
                ("BTCUSDT".to_string(), TimeFrame::Day1),
                ("ETHUSDT".to_string(), TimeFrame::Minute15),
            ]
        );
    }
}
