//! MACD confluence rule.

use crate::config::{MoveWeights, RubricConfig};
use crate::services::scoring::{RuleCredit, ScoringRule};
use crate::types::IndicatorSnapshot;

/// MACD rule.
///
/// Full credit for a bullish crossover (histogram > 0 and MACD above signal),
/// partial credit when only one of the two holds. Missing MACD earns neutral
/// credit: absent data is never scored as bearish.
pub struct MacdRule;

impl ScoringRule for MacdRule {
    fn id(&self) -> &str {
        "macd"
    }

    fn evaluate(&self, snapshot: &IndicatorSnapshot, rubric: &RubricConfig) -> RuleCredit {
        let macd = match snapshot.macd {
            Some(macd) => macd,
            None => {
                return RuleCredit::new(
                    rubric.macd_missing_points,
                    format!("MACD unavailable, neutral credit (+{:.0})", rubric.macd_missing_points),
                )
            }
        };

        if macd.is_bullish() {
            RuleCredit::new(
                rubric.macd_bullish_points,
                format!(
                    "MACD bullish crossover, histogram {:.4} (+{:.0})",
                    macd.histogram, rubric.macd_bullish_points
                ),
            )
        } else if macd.is_nearly_bullish() {
            RuleCredit::new(
                rubric.macd_near_points,
                format!("MACD nearly bullish (+{:.0})", rubric.macd_near_points),
            )
        } else {
            RuleCredit::new(0.0, "MACD bearish")
        }
    }

    fn move_weight(&self, weights: &MoveWeights) -> f64 {
        weights.macd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MacdValues;

    fn with_macd(macd: Option<MacdValues>) -> IndicatorSnapshot {
        IndicatorSnapshot {
            macd,
            ..Default::default()
        }
    }

    #[test]
    fn test_macd_bullish_full_credit() {
        let macd = MacdValues { macd: 1.0, signal: 0.5, histogram: 0.5 };
        let credit = MacdRule.evaluate(&with_macd(Some(macd)), &RubricConfig::momentum());
        assert_eq!(credit.points, 20.0);
    }

    #[test]
    fn test_macd_nearly_bullish_partial() {
        let macd = MacdValues { macd: 0.4, signal: 0.5, histogram: 0.1 };
        let credit = MacdRule.evaluate(&with_macd(Some(macd)), &RubricConfig::momentum());
        assert_eq!(credit.points, 10.0);
    }

    #[test]
    fn test_macd_missing_never_zero() {
        for rubric in [RubricConfig::momentum(), RubricConfig::adaptive()] {
            let credit = MacdRule.evaluate(&with_macd(None), &rubric);
            assert!(credit.points > 0.0);
            assert_eq!(credit.points, rubric.macd_missing_points);
        }
    }

    #[test]
    fn test_macd_bearish_no_credit() {
        let macd = MacdValues { macd: -1.0, signal: 0.0, histogram: -1.0 };
        let credit = MacdRule.evaluate(&with_macd(Some(macd)), &RubricConfig::momentum());
        assert_eq!(credit.points, 0.0);
    }
}
