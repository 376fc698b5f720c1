//! Entry-enhancement overlay.
//!
//! Re-scores an approved BUY with a more permissive entry rubric and, when the
//! entry looks good, attaches staged profit targets, a tight stop and a max
//! hold time. It never vetoes a signal: a low entry score leaves the signal in
//! standard mode and an internal failure returns it untouched.

use tracing::{debug, warn};

use crate::config::{band_points, EnhancementConfig};
use crate::error::{Result, ScoringError};
use crate::types::{Enhancement, IndicatorSnapshot, ProfitTarget, ScoreBreakdown, Signal};

/// Exit plan for an entry that cleared the bar.
#[derive(Debug, Clone, PartialEq)]
struct EntryPlan {
    profit_targets: Vec<ProfitTarget>,
    stop_loss_percent: f64,
    max_hold_minutes: u32,
}

#[derive(Debug, Clone, Default)]
pub struct EntryEnhancer {
    config: EnhancementConfig,
}

impl EntryEnhancer {
    pub fn new(config: EnhancementConfig) -> Self {
        Self { config }
    }

    /// Annotate an approved BUY. Signals that are not BUY pass through.
    pub fn enhance(
        &self,
        symbol: &str,
        mut signal: Signal,
        snapshot: &IndicatorSnapshot,
        breakdown: &ScoreBreakdown,
    ) -> Signal {
        if !self.config.enabled || !signal.is_buy() {
            signal.diagnostics.enhancement = Enhancement::NotAttempted;
            return signal;
        }

        let entry_score = self.entry_score(snapshot);
        if entry_score < self.config.min_entry_score {
            debug!(
                "{} entry score {:.0} below {:.0}, standard mode",
                symbol, entry_score, self.config.min_entry_score
            );
            signal.diagnostics.enhancement = Enhancement::Standard {
                entry_score,
                reason: format!(
                    "Entry score {:.0} below enhancement bar {:.0}",
                    entry_score, self.config.min_entry_score
                ),
            };
            return signal;
        }

        match self.plan(entry_score, breakdown.expected_move) {
            Ok(plan) => {
                let final_target = plan
                    .profit_targets
                    .last()
                    .map(|t| t.percent)
                    .unwrap_or(signal.take_profit_percent);

                signal.stop_loss_percent = plan.stop_loss_percent;
                signal.take_profit_percent = final_target;
                if plan.stop_loss_percent > 0.0 {
                    signal.diagnostics.risk_reward = final_target / plan.stop_loss_percent;
                }
                signal.reasoning.push(format!(
                    "Entry enhanced (score {:.0}): targets {}, stop {:.2}%, max hold {}m",
                    entry_score,
                    plan.profit_targets
                        .iter()
                        .map(|t| format!("{:.2}%", t.percent))
                        .collect::<Vec<_>>()
                        .join("/"),
                    plan.stop_loss_percent,
                    plan.max_hold_minutes
                ));
                debug!("{} enhanced with entry score {:.0}", symbol, entry_score);

                signal.diagnostics.enhancement = Enhancement::Enhanced {
                    entry_score,
                    profit_targets: plan.profit_targets,
                    stop_loss_percent: plan.stop_loss_percent,
                    max_hold_minutes: plan.max_hold_minutes,
                };
                signal
            }
            Err(e) => {
                warn!("Entry enhancement failed for {}, keeping base signal: {}", symbol, e);
                signal.diagnostics.enhancement = Enhancement::Failed {
                    reason: e.to_string(),
                };
                signal
            }
        }
    }

    /// Entry rubric score (0-100). Missing indicators earn neutral credit.
    pub fn entry_score(&self, snapshot: &IndicatorSnapshot) -> f64 {
        let c = &self.config;

        let rsi = match snapshot.rsi {
            Some(r) if r >= c.rsi_good_low && r <= c.rsi_good_high => c.rsi_good_points,
            Some(r) if r >= c.rsi_fair_low && r <= c.rsi_fair_high => c.rsi_fair_points,
            Some(_) => 0.0,
            None => c.rsi_fair_points,
        };

        let macd = match snapshot.macd {
            Some(m) if m.histogram > 0.0 => c.macd_positive_points,
            Some(_) => 0.0,
            None => c.macd_missing_points,
        };

        let ema = match (snapshot.price, snapshot.ema20) {
            (Some(price), Some(e20)) if price > e20 => c.above_ema20_points,
            (Some(_), Some(_)) => 0.0,
            _ => c.ema_missing_points,
        };

        let volume = match snapshot.volume_ratio {
            Some(v) => band_points(&c.volume_bands, v).unwrap_or(0.0),
            None => c.volume_missing_points,
        };

        let adx = match snapshot.adx {
            Some(a) => band_points(&c.adx_bands, a).unwrap_or(0.0),
            None => c.adx_missing_points,
        };

        let bollinger = match (snapshot.price, snapshot.bbands) {
            (Some(price), Some(bands)) => match bands.position(price) {
                Some(pos) if pos <= 0.5 => c.bb_lower_half_points,
                Some(_) => 0.0,
                None => c.bb_missing_points,
            },
            _ => c.bb_missing_points,
        };

        (rsi + macd + ema + volume + adx + bollinger).clamp(0.0, 100.0)
    }

    fn plan(&self, entry_score: f64, expected_move: f64) -> Result<EntryPlan> {
        let c = &self.config;
        if !expected_move.is_finite() || expected_move <= 0.0 {
            return Err(ScoringError::Internal(format!(
                "expected move {} cannot anchor profit targets",
                expected_move
            )));
        }
        if c.target_fractions.is_empty() {
            return Err(ScoringError::Internal("no profit target fractions configured".into()));
        }

        let profit_targets = c
            .target_fractions
            .iter()
            .map(|fraction| ProfitTarget {
                percent: expected_move * fraction,
                fraction_of_move: *fraction,
            })
            .collect();

        let stop_loss_percent =
            (expected_move * c.stop_fraction).clamp(c.min_stop_percent, c.max_stop_percent);

        let headroom = (100.0 - c.min_entry_score).max(f64::EPSILON);
        let strength = ((entry_score - c.min_entry_score) / headroom).clamp(0.0, 1.0);
        let hold_hours = (c.min_hold_hours + strength * (c.max_hold_hours - c.min_hold_hours))
            .clamp(c.min_hold_hours, c.max_hold_hours);

        Ok(EntryPlan {
            profit_targets,
            stop_loss_percent,
            max_hold_minutes: (hold_hours * 60.0).round() as u32,
        })
    }
}
