use std::time::Duration;
use thiserror::Error;

/// Failures at the market-data / order-execution boundary. Always recoverable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: &'static str, after: Duration },

    #[error("No market data available for '{symbol}'")]
    NoMarketData { symbol: String },

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Insufficient quote balance: need {needed:.4}, have {available:.4}")]
    InsufficientBalance { needed: f64, available: f64 },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Ledger state violations plus provider failures hit while filling an order.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Position already open for '{symbol}'")]
    AlreadyOpen { symbol: String },

    #[error("No open position for '{symbol}'")]
    NoOpenPosition { symbol: String },

    #[error("Invalid quantity {quantity} for '{symbol}'")]
    InvalidQuantity { symbol: String, quantity: f64 },

    #[error("Cannot sell {requested} of '{symbol}': only {held} held")]
    QuantityExceedsPosition { symbol: String, requested: f64, held: f64 },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl LedgerError {
    /// True for errors caused by the request itself rather than the provider.
    pub fn is_state_violation(&self) -> bool {
        !matches!(self, LedgerError::Provider(_))
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("CSV parsing system error: {source}")]
    CsvSystemError {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("CSV data format error: {0}")]
    CsvDataFormatError(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Bot is already running")]
    AlreadyRunning,

    #[error("Bot is not running")]
    NotRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_violation_classification() {
        assert!(LedgerError::AlreadyOpen { symbol: "BTCUSDT".into() }.is_state_violation());
        assert!(LedgerError::NoOpenPosition { symbol: "BTCUSDT".into() }.is_state_violation());
        let provider = LedgerError::from(ProviderError::Unavailable("down".into()));
        assert!(!provider.is_state_violation());
    }

    #[test]
    fn test_ledger_error_wraps_into_engine_error() {
        let err: EngineError = LedgerError::NoOpenPosition { symbol: "ETHUSDT".into() }.into();
        assert_eq!(err.to_string(), "No open position for 'ETHUSDT'");
    }

    #[test]
    fn test_timeout_message() {
        let err = ProviderError::Timeout { operation: "fetch_current_price", after: Duration::from_secs(10) };
        assert_eq!(err.to_string(), "fetch_current_price timed out after 10s");
    }
}
