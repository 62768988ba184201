// Price momentum: rate of change of closes, normalized
use super::{FactorScorer, Normalizer, NEUTRAL_SCORE};

pub struct MomentumScorer {
    normalizer: Normalizer,
}

impl MomentumScorer {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }
}

/// Simple returns `close[i] / close[i-1] - 1`. A zero previous close contributes a zero return.
pub fn simple_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { w[1] / w[0] - 1.0 })
        .collect()
}

impl FactorScorer for MomentumScorer {
    fn name(&self) -> &str {
        "price"
    }

    fn score(&self, closes: &[f64]) -> f64 {
        if closes.len() < 2 {
            return NEUTRAL_SCORE;
        }
        self.normalizer.normalize_last(&simple_returns(closes))
    }
}
