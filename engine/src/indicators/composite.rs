// Weighted blend of the four factor scores into one combined 0-100 score
use super::{FactorScorer, MomentumScorer, Normalizer, RsiScorer, VolatilityScorer, VolumeScorer};
use crate::config::settings::{IndicatorSettings, ScoreWeights, TraderSettings};
use shared::models::{CandleSeries, ScoreComponents, TimeFrame, TimeframeScore};
use std::collections::BTreeMap;

pub struct CompositeScorer {
    momentum: MomentumScorer,
    volume: VolumeScorer,
    volatility: VolatilityScorer,
    rsi: RsiScorer,
    weights: ScoreWeights,
}

impl CompositeScorer {
    pub fn new(indicators: &IndicatorSettings, weights: ScoreWeights) -> Self {
        let normalizer = Normalizer::new(indicators.sigmoid_k);
        Self {
            momentum: MomentumScorer::new(normalizer),
            volume: VolumeScorer::new(normalizer, indicators.lookback),
            volatility: VolatilityScorer::new(normalizer, indicators.volatility_period),
            rsi: RsiScorer::new(indicators.rsi_period, indicators.lookback, normalizer),
            weights,
        }
    }

    pub fn from_settings(settings: &TraderSettings) -> Self {
        Self::new(&settings.indicators, settings.weights)
    }

    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    /// Combined score plus every component.
    ///
    /// A zero total weight is replaced by 1.0, so all-zero weights yield a combined
    /// score of 0.0 instead of a division by zero.
    pub fn score(&self, closes: &[f64], volumes: &[f64]) -> (f64, ScoreComponents) {
        let price = self.momentum.score(closes);
        let volume = self.volume.score(volumes);
        let rsi = self.rsi.reading(closes);
        let volatility = self.volatility.score(closes);

        let w = &self.weights;
        let mut total_weight = w.total();
        if total_weight == 0.0 {
            total_weight = 1.0;
        }
        let combined = (w.price * price
            + w.volume * volume
            + w.rsi * rsi.normalized
            + w.volatility * volatility)
            / total_weight;

        tracing::trace!(
            closes = closes.len(),
            volumes = volumes.len(),
            rsi_period = self.rsi.period(),
            "{}={:.2} {}={:.2} {}={:.2} {}={:.2} combined={:.2}",
            self.momentum.name(), price,
            self.volume.name(), volume,
            self.rsi.name(), rsi.normalized,
            self.volatility.name(), volatility,
            combined
        );

        let components = ScoreComponents {
            price,
            volume,
            rsi: rsi.raw,
            rsi_normalized: rsi.normalized,
            volatility,
            combined,
        };
        (combined, components)
    }

    pub fn score_series(&self, series: &CandleSeries) -> TimeframeScore {
        let (combined, components) = self.score(&series.closes(), &series.volumes());
        TimeframeScore { combined, components, samples: series.len() }
    }

    /// Scores every timeframe independently. Empty or short series score neutral.
    pub fn score_timeframes(
        &self,
        series_by_timeframe: &BTreeMap<TimeFrame, CandleSeries>,
    ) -> BTreeMap<TimeFrame, TimeframeScore> {
        series_by_timeframe
            .iter()
            .map(|(tf, series)| (*tf, self.score_series(series)))
            .collect()
    }
}
