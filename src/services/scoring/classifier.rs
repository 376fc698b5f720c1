//! Threshold ladder mapping a confluence score to a quality tier.

use crate::config::{IndicatorDefaults, TierRequirements, TierTable};
use crate::types::{IndicatorSnapshot, Tier};
use tracing::debug;

/// Assigns the strictest tier whose requirements a signal meets.
#[derive(Debug, Clone)]
pub struct TierClassifier {
    requirements: TierTable<TierRequirements>,
    defaults: IndicatorDefaults,
}

impl TierClassifier {
    pub fn new(requirements: TierTable<TierRequirements>, defaults: IndicatorDefaults) -> Self {
        Self {
            requirements,
            defaults,
        }
    }

    /// Evaluate premium, then moderate, then conservative. Missing RSI, ADX or
    /// volume fall back to the configured neutral defaults.
    pub fn classify(&self, score: f64, snapshot: &IndicatorSnapshot) -> Tier {
        let rsi = snapshot.rsi.unwrap_or(self.defaults.rsi);
        let adx = snapshot.adx.unwrap_or(self.defaults.adx);
        let volume = snapshot.volume_ratio.unwrap_or(self.defaults.volume_ratio);

        let tier = self
            .requirements
            .iter()
            .find(|(_, req)| Self::meets(req, score, rsi, adx, volume))
            .map(|(tier, _)| tier)
            .unwrap_or(Tier::Rejected);

        debug!(
            "Classified {} as {} (score {:.1}, rsi {:.1}, adx {:.1}, volume {:.2})",
            snapshot.symbol, tier, score, rsi, adx, volume
        );

        tier
    }

    fn meets(req: &TierRequirements, score: f64, rsi: f64, adx: f64, volume: f64) -> bool {
        score >= req.min_score
            && rsi >= req.rsi_low
            && rsi <= req.rsi_high
            && adx >= req.min_adx
            && volume >= req.min_volume_ratio
    }
}

impl Default for TierClassifier {
    fn default() -> Self {
        Self::new(TierTable::default(), IndicatorDefaults::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scoring::test_support::premium_snapshot;

    #[test]
    fn test_premium_classification() {
        let classifier = TierClassifier::default();
        assert_eq!(classifier.classify(100.0, &premium_snapshot()), Tier::Premium);
    }

    #[test]
    fn test_falls_to_moderate_on_adx() {
        let classifier = TierClassifier::default();
        let mut snapshot = premium_snapshot();
        snapshot.adx = Some(22.0);
        assert_eq!(classifier.classify(90.0, &snapshot), Tier::Moderate);
    }

    #[test]
    fn test_score_ladder() {
        let classifier = TierClassifier::default();
        let snapshot = premium_snapshot();
        assert_eq!(classifier.classify(75.0, &snapshot), Tier::Premium);
        assert_eq!(classifier.classify(74.9, &snapshot), Tier::Moderate);
        assert_eq!(classifier.classify(60.0, &snapshot), Tier::Moderate);
        assert_eq!(classifier.classify(50.0, &snapshot), Tier::Conservative);
        assert_eq!(classifier.classify(44.0, &snapshot), Tier::Rejected);
    }

    #[test]
    fn test_rsi_outside_every_band_rejected() {
        let classifier = TierClassifier::default();
        let mut snapshot = premium_snapshot();
        snapshot.rsi = Some(82.0);
        assert_eq!(classifier.classify(95.0, &snapshot), Tier::Rejected);
    }

    #[test]
    fn test_missing_values_use_defaults() {
        let classifier = TierClassifier::default();
        let mut snapshot = premium_snapshot();
        snapshot.rsi = None;
        snapshot.adx = None;
        snapshot.volume_ratio = None;
        // Defaults: rsi 50, adx 20, volume 1.0 -> only conservative bounds hold
        assert_eq!(classifier.classify(95.0, &snapshot), Tier::Conservative);
    }

    #[test]
    fn test_thresholds_overridable() {
        let mut requirements: TierTable<TierRequirements> = TierTable::default();
        requirements.premium.min_adx = 30.0;
        let classifier = TierClassifier::new(requirements, IndicatorDefaults::default());
        assert_eq!(classifier.classify(100.0, &premium_snapshot()), Tier::Moderate);
    }
}
