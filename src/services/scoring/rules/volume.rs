//! Volume ratio confluence rule.

use crate::config::{band_points, MoveWeights, RubricConfig};
use crate::services::scoring::{RuleCredit, ScoringRule};
use crate::types::IndicatorSnapshot;

/// Volume ratio (current volume / average volume) rule.
///
/// Tiered credit bands from the rubric; below the lowest band a small penalty.
pub struct VolumeRule;

impl ScoringRule for VolumeRule {
    fn id(&self) -> &str {
        "volume"
    }

    fn evaluate(&self, snapshot: &IndicatorSnapshot, rubric: &RubricConfig) -> RuleCredit {
        match snapshot.volume_ratio {
            Some(ratio) => match band_points(&rubric.volume_bands, ratio) {
                Some(points) => {
                    RuleCredit::new(points, format!("Volume {:.2}x average (+{:.0})", ratio, points))
                }
                None => RuleCredit::new(
                    rubric.volume_below_points,
                    format!("Volume {:.2}x below average ({:.0})", ratio, rubric.volume_below_points),
                ),
            },
            None => RuleCredit::new(
                rubric.volume_missing_points,
                format!("Volume unavailable, neutral credit (+{:.0})", rubric.volume_missing_points),
            ),
        }
    }

    fn move_weight(&self, weights: &MoveWeights) -> f64 {
        weights.volume
    }
}
