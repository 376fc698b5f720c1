//! Confluence scoring.
//!
//! Turns an indicator snapshot into a 0-100 confluence score by adding up
//! independent point rules, then maps that score onto a quality tier.

pub mod classifier;
pub mod rules;

pub use classifier::TierClassifier;
pub use rules::all_rules;

use crate::config::{MoveWeights, RubricConfig};
use crate::types::{IndicatorSnapshot, ScoreBreakdown};
use tracing::{debug, trace};

/// Points one rule awarded for a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCredit {
    pub points: f64,
    /// Human-readable reason; None when the rule had nothing to say.
    pub reason: Option<String>,
}

impl RuleCredit {
    pub fn new(points: f64, reason: impl Into<String>) -> Self {
        Self {
            points,
            reason: Some(reason.into()),
        }
    }

    pub fn none() -> Self {
        Self {
            points: 0.0,
            reason: None,
        }
    }
}

/// Trait for implementing confluence rules.
pub trait ScoringRule: Send + Sync {
    /// Unique identifier for this rule.
    fn id(&self) -> &str;

    /// Points and reason for a snapshot under the given rubric.
    /// Missing indicators must map to the rubric's neutral credit.
    fn evaluate(&self, snapshot: &IndicatorSnapshot, rubric: &RubricConfig) -> RuleCredit;

    /// Expected-move weight per earned point.
    fn move_weight(&self, weights: &MoveWeights) -> f64;
}

/// Additive point scorer over a fixed set of rules.
pub struct ConfluenceScorer {
    rules: Vec<Box<dyn ScoringRule>>,
}

impl ConfluenceScorer {
    pub fn new() -> Self {
        Self { rules: all_rules() }
    }

    /// Score a snapshot. Never fails: missing data earns neutral credit.
    pub fn score(&self, snapshot: &IndicatorSnapshot, rubric: &RubricConfig) -> ScoreBreakdown {
        let mut total = 0.0;
        let mut expected_move = 0.0;
        let mut reasons = Vec::new();

        for rule in &self.rules {
            let credit = rule.evaluate(snapshot, rubric);
            trace!("{} {}: {:+.1}", snapshot.symbol, rule.id(), credit.points);
            total += credit.points;
            expected_move += credit.points.max(0.0) * rule.move_weight(&rubric.move_weights);
            if let Some(reason) = credit.reason {
                reasons.push(reason);
            }
        }

        let total_score = total.clamp(0.0, 100.0);
        let expected_move = expected_move.max(rubric.min_expected_move);

        debug!(
            "Confluence for {}: {:.1} (raw {:.1}), expected move {:.2}%",
            snapshot.symbol, total_score, total, expected_move
        );

        ScoreBreakdown {
            total_score,
            contributing_reasons: reasons,
            expected_move,
        }
    }
}

impl Default for ConfluenceScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::{IndicatorSnapshot, MacdValues};

    /// Bullish snapshot that clears every premium requirement.
    pub fn premium_snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            symbol: "BTC".to_string(),
            timeframe: "1h".to_string(),
            timestamp: 1_700_000_000_000,
            price: Some(107.0),
            rsi: Some(45.0),
            macd: Some(MacdValues { macd: 1.0, signal: 0.5, histogram: 0.5 }),
            ema20: Some(105.0),
            ema50: Some(100.0),
            ema200: Some(90.0),
            adx: Some(28.0),
            volume_ratio: Some(1.6),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::premium_snapshot;
    use super::*;

    #[test]
    fn test_premium_snapshot_scores_high() {
        let scorer = ConfluenceScorer::new();
        let breakdown = scorer.score(&premium_snapshot(), &RubricConfig::momentum());
        assert_eq!(breakdown.total_score, 100.0);
        assert!(breakdown.expected_move > 2.0);
        assert!(!breakdown.contributing_reasons.is_empty());
    }

    #[test]
    fn test_empty_snapshot_gets_neutral_credit() {
        let scorer = ConfluenceScorer::new();
        let snapshot = IndicatorSnapshot::new("BTC", "1h");
        let rubric = RubricConfig::momentum();
        let breakdown = scorer.score(&snapshot, &rubric);

        let neutral = rubric.rsi_missing_points
            + rubric.macd_missing_points
            + rubric.ema_missing_points
            + rubric.volume_missing_points
            + rubric.adx_missing_points;
        assert_eq!(breakdown.total_score, neutral);
        assert!(breakdown.expected_move >= rubric.min_expected_move);
    }

    #[test]
    fn test_expected_move_has_floor() {
        let scorer = ConfluenceScorer::new();
        let mut rubric = RubricConfig::momentum();
        rubric.min_expected_move = 50.0;
        let breakdown = scorer.score(&premium_snapshot(), &rubric);
        assert_eq!(breakdown.expected_move, 50.0);
    }

    #[test]
    fn test_score_never_negative() {
        let scorer = ConfluenceScorer::new();
        let mut snapshot = premium_snapshot();
        snapshot.rsi = Some(95.0);
        snapshot.macd = Some(crate::types::MacdValues { macd: -1.0, signal: 0.0, histogram: -1.0 });
        snapshot.price = Some(80.0);
        snapshot.volume_ratio = Some(0.2);
        snapshot.adx = Some(5.0);
        let breakdown = scorer.score(&snapshot, &RubricConfig::momentum());
        assert_eq!(breakdown.total_score, 0.0);
    }

    #[test]
    fn test_volume_monotonic() {
        let scorer = ConfluenceScorer::new();
        for rubric in [RubricConfig::momentum(), RubricConfig::adaptive()] {
            let mut previous = f64::MIN;
            for step in 0..=30 {
                let mut snapshot = premium_snapshot();
                snapshot.rsi = Some(60.0);
                snapshot.volume_ratio = Some(step as f64 * 0.1);
                let score = scorer.score(&snapshot, &rubric).total_score;
                assert!(score >= previous, "score fell at volume ratio {}", step as f64 * 0.1);
                previous = score;
            }
        }
    }

    #[test]
    fn test_adaptive_rubric_differs() {
        let scorer = ConfluenceScorer::new();
        let mut snapshot = premium_snapshot();
        snapshot.rsi = Some(53.0);
        let strict = scorer.score(&snapshot, &RubricConfig::momentum()).total_score;
        let loose = scorer.score(&snapshot, &RubricConfig::adaptive()).total_score;
        assert_ne!(strict, loose);
    }
}
