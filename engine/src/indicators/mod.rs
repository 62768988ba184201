// Signal scorers. Every factor is reduced to a 0-100 value through the sigmoid normalizer.
pub mod composite;
pub mod momentum;
pub mod normalizer;
pub mod rsi;
pub mod volatility;
pub mod volume;

pub use composite::CompositeScorer;
pub use momentum::MomentumScorer;
pub use normalizer::Normalizer;
pub use rsi::{RsiReading, RsiScorer};
pub use volatility::VolatilityScorer;
pub use volume::VolumeScorer;

/// Score reported whenever there is not enough data to say anything.
pub const NEUTRAL_SCORE: f64 = 50.0;

// Common trait for the single-factor scorers
pub trait FactorScorer: Send + Sync {
    fn name(&self) -> &str;
    /// Reduces a raw series (closes or volumes) to one 0-100 score.
    fn score(&self, series: &[f64]) -> f64;
}
