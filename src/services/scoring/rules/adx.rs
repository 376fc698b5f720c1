//! ADX trend-strength confluence rule.

use crate::config::{band_points, MoveWeights, RubricConfig};
use crate::services::scoring::{RuleCredit, ScoringRule};
use crate::types::IndicatorSnapshot;

/// ADX rule: strong, moderate and weak-but-credited trend bands.
pub struct AdxRule;

impl ScoringRule for AdxRule {
    fn id(&self) -> &str {
        "adx"
    }

    fn evaluate(&self, snapshot: &IndicatorSnapshot, rubric: &RubricConfig) -> RuleCredit {
        match snapshot.adx {
            Some(adx) => match band_points(&rubric.adx_bands, adx) {
                Some(points) => {
                    RuleCredit::new(points, format!("ADX {:.1} trend strength (+{:.0})", adx, points))
                }
                None => RuleCredit::new(
                    rubric.adx_below_points,
                    format!("ADX {:.1} no trend", adx),
                ),
            },
            None => RuleCredit::new(
                rubric.adx_missing_points,
                format!("ADX unavailable, neutral credit (+{:.0})", rubric.adx_missing_points),
            ),
        }
    }

    fn move_weight(&self, weights: &MoveWeights) -> f64 {
        weights.adx
    }
}
