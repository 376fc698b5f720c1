//! RSI confluence rule.

use crate::config::{MoveWeights, RubricConfig};
use crate::services::scoring::{RuleCredit, ScoringRule};
use crate::types::IndicatorSnapshot;

/// RSI rule.
///
/// - Sweet-spot band: full credit
/// - Wider acceptable band: partial credit
/// - Extremes (deeply oversold or overbought): small penalty
/// - Anything else: no credit
pub struct RsiRule;

impl ScoringRule for RsiRule {
    fn id(&self) -> &str {
        "rsi"
    }

    fn evaluate(&self, snapshot: &IndicatorSnapshot, rubric: &RubricConfig) -> RuleCredit {
        let rsi = match snapshot.rsi {
            Some(rsi) => rsi,
            None => {
                return RuleCredit::new(
                    rubric.rsi_missing_points,
                    format!("RSI unavailable, neutral credit (+{:.0})", rubric.rsi_missing_points),
                )
            }
        };

        if rsi >= rubric.rsi_sweet_low && rsi <= rubric.rsi_sweet_high {
            RuleCredit::new(
                rubric.rsi_sweet_points,
                format!(
                    "RSI {:.1} in sweet spot {:.0}-{:.0} (+{:.0})",
                    rsi, rubric.rsi_sweet_low, rubric.rsi_sweet_high, rubric.rsi_sweet_points
                ),
            )
        } else if rsi >= rubric.rsi_ok_low && rsi <= rubric.rsi_ok_high {
            RuleCredit::new(
                rubric.rsi_ok_points,
                format!("RSI {:.1} acceptable (+{:.0})", rsi, rubric.rsi_ok_points),
            )
        } else if rsi < rubric.rsi_extreme_low || rsi > rubric.rsi_extreme_high {
            RuleCredit::new(
                rubric.rsi_extreme_penalty,
                format!("RSI {:.1} extreme ({:.0})", rsi, rubric.rsi_extreme_penalty),
            )
        } else {
            RuleCredit::new(0.0, format!("RSI {:.1} outside preferred range", rsi))
        }
    }

    fn move_weight(&self, weights: &MoveWeights) -> f64 {
        weights.rsi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_rsi(rsi: Option<f64>) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi,
            ..Default::default()
        }
    }

    #[test]
    fn test_rsi_sweet_spot() {
        let credit = RsiRule.evaluate(&with_rsi(Some(45.0)), &RubricConfig::momentum());
        assert_eq!(credit.points, 25.0);
    }

    #[test]
    fn test_rsi_acceptable_band() {
        let credit = RsiRule.evaluate(&with_rsi(Some(60.0)), &RubricConfig::momentum());
        assert_eq!(credit.points, 12.0);
    }

    #[test]
    fn test_rsi_extremes_penalized() {
        let rubric = RubricConfig::momentum();
        assert_eq!(RsiRule.evaluate(&with_rsi(Some(15.0)), &rubric).points, -10.0);
        assert_eq!(RsiRule.evaluate(&with_rsi(Some(90.0)), &rubric).points, -10.0);
    }

    #[test]
    fn test_rsi_between_bands_no_credit() {
        let credit = RsiRule.evaluate(&with_rsi(Some(75.0)), &RubricConfig::momentum());
        assert_eq!(credit.points, 0.0);
    }

    #[test]
    fn test_rsi_missing_neutral() {
        let rubric = RubricConfig::adaptive();
        let credit = RsiRule.evaluate(&with_rsi(None), &rubric);
        assert_eq!(credit.points, rubric.rsi_missing_points);
        assert!(credit.reason.unwrap().contains("unavailable"));
    }
}
