// Sigmoid normalization: z-score -> logistic -> 0-100
use super::NEUTRAL_SCORE;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    steepness: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self { steepness: 1.0 }
    }
}

impl Normalizer {
    pub fn new(steepness: f64) -> Self {
        Self { steepness }
    }

    pub fn steepness(&self) -> f64 {
        self.steepness
    }

    /// Maps every sample to `100 / (1 + e^(-k*z))` using the population mean and
    /// standard deviation of the whole slice.
    ///
    /// Fewer than two samples are returned unchanged. A flat series maps to 50.0 everywhere.
    pub fn normalize(&self, samples: &[f64]) -> Vec<f64> {
        if samples.len() < 2 {
            return samples.to_vec();
        }
        // Checked on the raw values: the mean of identical floats can round away from them.
        if samples.iter().all(|x| *x == samples[0]) {
            return vec![NEUTRAL_SCORE; samples.len()];
        }

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            return vec![NEUTRAL_SCORE; samples.len()];
        }

        samples
            .iter()
            .map(|x| {
                let z = (x - mean) / std_dev;
                100.0 / (1.0 + (-self.steepness * z).exp())
            })
            .collect()
    }

    /// Normalized value of the most recent sample, or neutral when the slice is too short
    /// to normalize.
    pub fn normalize_last(&self, samples: &[f64]) -> f64 {
        if samples.len() < 2 {
            return NEUTRAL_SCORE;
        }
        self.normalize(samples).last().copied().unwrap_or(NEUTRAL_SCORE)
    }
}
