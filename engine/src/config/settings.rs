// Trader settings, loaded from an optional JSON file on top of built-in defaults
use crate::error::EngineError;
use serde::Deserialize;
use shared::models::TimeFrame;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TraderSettings {
    /// Timeframes scored by `analyze`.
    pub timeframes: Vec<TimeFrame>,
    /// Timeframe whose combined score drives the decision loop.
    pub decision_timeframe: TimeFrame,
    pub weights: ScoreWeights,
    pub indicators: IndicatorSettings,
    pub trading: TradingSettings,
    pub paper: PaperSettings,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ScoreWeights {
    pub price: f64,
    pub volume: f64,
    pub rsi: f64,
    pub volatility: f64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct IndicatorSettings {
    pub lookback: usize,
    pub sigmoid_k: f64,
    pub volatility_period: usize,
    pub rsi_period: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TradingSettings {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub default_quantity: f64,
    pub max_concurrent_positions: usize,
    pub poll_interval_secs: u64,
    pub candle_limit: usize,
    pub provider_timeout_secs: u64,
    pub stop_grace_secs: u64,
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct PaperSettings {
    pub initial_balance: f64,
}

impl Default for TraderSettings {
    fn default() -> Self {
        TraderSettings {
            timeframes: TimeFrame::ALL.to_vec(),
            decision_timeframe: TimeFrame::Hour1,
            weights: ScoreWeights::default(),
            indicators: IndicatorSettings::default(),
            trading: TradingSettings::default(),
            paper: PaperSettings::default(),
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights { price: 70.0, volume: 10.0, rsi: 10.0, volatility: 10.0 }
    }
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        IndicatorSettings { lookback: 100, sigmoid_k: 1.0, volatility_period: 20, rsi_period: 14 }
    }
}

impl Default for TradingSettings {
    fn default() -> Self {
        TradingSettings {
            buy_threshold: 70.0,
            sell_threshold: 30.0,
            default_quantity: 0.01,
            max_concurrent_positions: 5,
            poll_interval_secs: 300,
            candle_limit: 100,
            provider_timeout_secs: 10,
            stop_grace_secs: 30,
            symbols: ["BTCUSDT", "ETHUSDT", "BNBUSDT", "ADAUSDT", "SOLUSDT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for PaperSettings {
    fn default() -> Self {
        PaperSettings { initial_balance: 1_000.0 }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.price + self.volume + self.rsi + self.volatility
    }
}

impl TradingSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

impl TraderSettings {
    /// Reads settings from `path` when given, otherwise uses the defaults. Either way the
    /// result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                Self::from_json(&raw)?
            }
            None => TraderSettings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        serde_json::from_str(raw)
            .map_err(|e| EngineError::ConfigError(format!("invalid settings JSON: {}", e)))
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: String| Err(EngineError::ConfigError(msg));
        let t = &self.trading;

        for (name, value) in [("buy_threshold", t.buy_threshold), ("sell_threshold", t.sell_threshold)] {
            if !(0.0..=100.0).contains(&value) {
                return invalid(format!("{} must be within [0, 100], got {}", name, value));
            }
        }
        if t.buy_threshold <= t.sell_threshold {
            return invalid(format!(
                "buy_threshold ({}) must be above sell_threshold ({})",
                t.buy_threshold, t.sell_threshold
            ));
        }
        if !(t.default_quantity.is_finite() && t.default_quantity > 0.0) {
            return invalid(format!("default_quantity must be positive, got {}", t.default_quantity));
        }
        if t.poll_interval_secs == 0 || t.provider_timeout_secs == 0 {
            return invalid("poll_interval_secs and provider_timeout_secs must be positive".to_string());
        }
        // A stop waits for the symbol in flight: candles, price and one order.
        if t.stop_grace_secs < t.provider_timeout_secs.saturating_mul(3) {
            return invalid(format!(
                "stop_grace_secs ({}) must be at least 3 x provider_timeout_secs ({})",
                t.stop_grace_secs, t.provider_timeout_secs
            ));
        }
        if t.candle_limit < 2 {
            return invalid(format!("candle_limit must be at least 2, got {}", t.candle_limit));
        }

        let w = &self.weights;
        if [w.price, w.volume, w.rsi, w.volatility].iter().any(|v| !v.is_finite() || *v < 0.0) {
            return invalid(format!("weights must be non-negative, got {:?}", w));
        }

        let i = &self.indicators;
        if i.lookback == 0 || i.rsi_period == 0 || i.volatility_period == 0 {
            return invalid("lookback, rsi_period and volatility_period must be positive".to_string());
        }
        if !(i.sigmoid_k.is_finite() && i.sigmoid_k > 0.0) {
            return invalid(format!("sigmoid_k must be positive, got {}", i.sigmoid_k));
        }

        if self.timeframes.is_empty() {
            return invalid("at least one timeframe is required".to_string());
        }
        if !self.timeframes.contains(&self.decision_timeframe) {
            return invalid(format!(
                "decision_timeframe {} is not among the configured timeframes",
                self.decision_timeframe
            ));
        }
        Ok(())
    }
}
