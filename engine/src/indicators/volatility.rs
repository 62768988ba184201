// Volatility: dispersion of log returns.
//
// The standard deviation of the returns is spread into a flat series before normalizing,
// so the score always comes out neutral. Callers rely on that value staying at 50.
use super::{FactorScorer, Normalizer, NEUTRAL_SCORE};

pub struct VolatilityScorer {
    normalizer: Normalizer,
    window: usize,
}

impl VolatilityScorer {
    pub fn new(normalizer: Normalizer, window: usize) -> Self {
        Self { normalizer, window }
    }

    /// Population standard deviation of the most recent `window` log returns.
    pub fn realized_volatility(&self, closes: &[f64]) -> Option<f64> {
        let returns = log_returns(closes);
        if returns.is_empty() {
            return None;
        }
        let recent = &returns[returns.len().saturating_sub(self.window)..];
        let n = recent.len() as f64;
        let mean = recent.iter().sum::<f64>() / n;
        let variance = recent.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        Some(variance.sqrt())
    }
}

pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

impl FactorScorer for VolatilityScorer {
    fn name(&self) -> &str {
        "volatility"
    }

    fn score(&self, closes: &[f64]) -> f64 {
        if closes.len() < 2 {
            return NEUTRAL_SCORE;
        }
        let Some(sigma) = self.realized_volatility(closes) else {
            return NEUTRAL_SCORE;
        };
        let span = log_returns(closes).len().min(self.window);
        self.normalizer.normalize_last(&vec![sigma; span])
    }
}
