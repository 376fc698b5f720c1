//! EMA structure confluence rule.

use crate::config::{MoveWeights, RubricConfig};
use crate::services::scoring::{RuleCredit, ScoringRule};
use crate::types::IndicatorSnapshot;

/// EMA structure rule.
///
/// - price > ema20 > ema50: full credit
/// - price above both EMAs without the ordering: strong partial credit
/// - price above one EMA: weak partial credit
/// - price below both: none
pub struct EmaStructureRule;

impl ScoringRule for EmaStructureRule {
    fn id(&self) -> &str {
        "ema_structure"
    }

    fn evaluate(&self, snapshot: &IndicatorSnapshot, rubric: &RubricConfig) -> RuleCredit {
        let missing = || {
            RuleCredit::new(
                rubric.ema_missing_points,
                format!("EMA data unavailable, baseline credit (+{:.0})", rubric.ema_missing_points),
            )
        };

        let price = match snapshot.price {
            Some(price) => price,
            None => return missing(),
        };
        if snapshot.ema20.is_none() && snapshot.ema50.is_none() {
            return missing();
        }

        let above20 = snapshot.ema20.map(|e| price > e);
        let above50 = snapshot.ema50.map(|e| price > e);

        match (above20, above50) {
            (Some(true), Some(true)) => {
                let aligned = matches!(
                    (snapshot.ema20, snapshot.ema50),
                    (Some(e20), Some(e50)) if e20 > e50
                );
                if aligned {
                    RuleCredit::new(
                        rubric.ema_aligned_points,
                        format!("Bullish EMA alignment price > EMA20 > EMA50 (+{:.0})", rubric.ema_aligned_points),
                    )
                } else {
                    RuleCredit::new(
                        rubric.ema_above_both_points,
                        format!("Price above EMA20 and EMA50 (+{:.0})", rubric.ema_above_both_points),
                    )
                }
            }
            (Some(true), _) | (_, Some(true)) => RuleCredit::new(
                rubric.ema_above_one_points,
                format!("Price above one EMA (+{:.0})", rubric.ema_above_one_points),
            ),
            _ => RuleCredit::new(0.0, "Price below EMAs"),
        }
    }

    fn move_weight(&self, weights: &MoveWeights) -> f64 {
        weights.ema
    }
}
