// Relative Strength Index (RSI) with Wilder smoothing, then normalized
use super::{FactorScorer, Normalizer, NEUTRAL_SCORE};

const EPSILON: f64 = 1e-10;

/// Raw and normalized RSI of the most recent bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiReading {
    pub raw: f64,
    pub normalized: f64,
}

pub struct RsiScorer {
    period: usize,
    lookback: usize,
    normalizer: Normalizer,
}

impl RsiScorer {
    pub fn new(period: usize, lookback: usize, normalizer: Normalizer) -> Self {
        Self { period, lookback, normalizer }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// RSI per close. Warm-up bars (the first `period`) are `None`.
    ///
    /// A series too short for a single RSI value is reported as neutral 50 throughout.
    pub fn series(&self, closes: &[f64]) -> Vec<Option<f64>> {
        if self.period == 0 || closes.len() < self.period + 1 {
            return vec![Some(NEUTRAL_SCORE); closes.len()];
        }

        let mut results = vec![None; self.period];

        let mut gains = 0.0;
        let mut losses = 0.0;
        // Seed with the simple mean of the first `period` changes
        for i in 1..=self.period {
            let change = closes[i] - closes[i - 1];
            if change > 0.0 {
                gains += change;
            } else {
                losses -= change;
            }
        }
        let mut avg_gain = gains / self.period as f64;
        let mut avg_loss = losses / self.period as f64;
        results.push(Some(rsi_from_averages(avg_gain, avg_loss)));

        for i in (self.period + 1)..closes.len() {
            let change = closes[i] - closes[i - 1];
            let (current_gain, current_loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };

            avg_gain = (avg_gain * (self.period - 1) as f64 + current_gain) / self.period as f64;
            avg_loss = (avg_loss * (self.period - 1) as f64 + current_loss) / self.period as f64;
            results.push(Some(rsi_from_averages(avg_gain, avg_loss)));
        }
        results
    }

    /// Last raw RSI and its normalized value over the most recent `lookback` bars.
    ///
    /// Warm-up bars enter the window as 0.0, the RSI of zero average gain and loss.
    pub fn reading(&self, closes: &[f64]) -> RsiReading {
        let raw: Vec<f64> = self
            .series(closes)
            .into_iter()
            .map(|value| value.unwrap_or_else(|| rsi_from_averages(0.0, 0.0)))
            .collect();
        let Some(&last) = raw.last() else {
            return RsiReading { raw: NEUTRAL_SCORE, normalized: NEUTRAL_SCORE };
        };
        let start = raw.len().saturating_sub(self.lookback);
        RsiReading { raw: last, normalized: self.normalizer.normalize_last(&raw[start..]) }
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = avg_gain / (avg_loss + EPSILON);
    100.0 - 100.0 / (1.0 + rs)
}

impl FactorScorer for RsiScorer {
    fn name(&self) -> &str {
        "rsi"
    }

    fn score(&self, closes: &[f64]) -> f64 {
        self.reading(closes).normalized
    }
}
