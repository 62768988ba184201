// Volume magnitude over a lookback window, normalized
use super::{FactorScorer, Normalizer, NEUTRAL_SCORE};

pub struct VolumeScorer {
    normalizer: Normalizer,
    lookback: usize,
}

impl VolumeScorer {
    pub fn new(normalizer: Normalizer, lookback: usize) -> Self {
        Self { normalizer, lookback }
    }
}

impl FactorScorer for VolumeScorer {
    fn name(&self) -> &str {
        "volume"
    }

    fn score(&self, volumes: &[f64]) -> f64 {
        if volumes.len() < 2 {
            return NEUTRAL_SCORE;
        }
        let start = volumes.len().saturating_sub(self.lookback);
        self.normalizer.normalize_last(&volumes[start..])
    }
}
