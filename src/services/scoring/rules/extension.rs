//! Price extension bonus.

use crate::config::{MoveWeights, RubricConfig};
use crate::services::scoring::{RuleCredit, ScoringRule};
use crate::types::IndicatorSnapshot;

/// Bonus points when price trades a configured percentage above EMA20/EMA50.
pub struct ExtensionRule;

fn extension_pct(price: f64, ema: f64) -> Option<f64> {
    (ema > 0.0).then(|| (price - ema) / ema * 100.0)
}

impl ScoringRule for ExtensionRule {
    fn id(&self) -> &str {
        "extension"
    }

    fn evaluate(&self, snapshot: &IndicatorSnapshot, rubric: &RubricConfig) -> RuleCredit {
        let price = match snapshot.price {
            Some(price) => price,
            None => return RuleCredit::none(),
        };

        let mut points = 0.0;
        let mut parts = Vec::new();

        if let Some(ext) = snapshot.ema20.and_then(|e| extension_pct(price, e)) {
            if ext >= rubric.ema20_extension_pct {
                points += rubric.ema20_extension_points;
                parts.push(format!("{:.1}% above EMA20", ext));
            }
        }
        if let Some(ext) = snapshot.ema50.and_then(|e| extension_pct(price, e)) {
            if ext >= rubric.ema50_extension_pct {
                points += rubric.ema50_extension_points;
                parts.push(format!("{:.1}% above EMA50", ext));
            }
        }

        if parts.is_empty() {
            RuleCredit::none()
        } else {
            RuleCredit::new(points, format!("Extension bonus: {} (+{:.0})", parts.join(", "), points))
        }
    }

    fn move_weight(&self, weights: &MoveWeights) -> f64 {
        weights.extension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_extension_bonuses() {
        let snapshot = IndicatorSnapshot {
            price: Some(107.0),
            ema20: Some(105.0),
            ema50: Some(100.0),
            ..Default::default()
        };
        let credit = ExtensionRule.evaluate(&snapshot, &RubricConfig::momentum());
        assert_eq!(credit.points, 10.0);
    }

    #[test]
    fn test_no_bonus_without_extension() {
        let snapshot = IndicatorSnapshot {
            price: Some(100.5),
            ema20: Some(100.0),
            ema50: Some(99.0),
            ..Default::default()
        };
        let credit = ExtensionRule.evaluate(&snapshot, &RubricConfig::momentum());
        assert_eq!(credit, RuleCredit::none());
    }

    #[test]
    fn test_missing_price_no_bonus() {
        let snapshot = IndicatorSnapshot {
            ema20: Some(100.0),
            ..Default::default()
        };
        assert_eq!(ExtensionRule.evaluate(&snapshot, &RubricConfig::momentum()).points, 0.0);
    }
}
