//! Quality filter cascade.
//!
//! Runs the four gates for a tier in a fixed order and stops at the first
//! block. A signal classified PREMIUM that gets blocked is retried at each
//! looser tier in turn; a MODERATE or CONSERVATIVE block is final.

pub mod gates;

use tracing::{debug, info};

use crate::config::{FilterConfig, GateThresholds};
use crate::error::{Result, ScoringError};
use crate::services::stats::StatsAccumulator;
use crate::types::{FilterOutcome, GateResult, IndicatorSnapshot, ScoreBreakdown, Tier};

/// Gate cascade over per-tier thresholds.
#[derive(Debug, Clone, Default)]
pub struct QualityFilter {
    config: FilterConfig,
}

impl QualityFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Evaluate a classified signal, cascading down from PREMIUM on a block.
    ///
    /// Returns an error only when a gate fails internally; callers treat that
    /// as a rejection.
    pub fn evaluate(
        &self,
        symbol: &str,
        breakdown: &ScoreBreakdown,
        snapshot: &IndicatorSnapshot,
        tier: Tier,
        stats: &StatsAccumulator,
    ) -> Result<FilterOutcome> {
        if !tier.is_approved() {
            return Ok(FilterOutcome {
                allowed: false,
                final_tier: None,
                quality_score: 0.0,
                reason: format!("Score {:.1} did not reach any tier", breakdown.total_score),
                attempted_tiers: Vec::new(),
                gate_results: Vec::new(),
            });
        }

        let cascades = tier == Tier::Premium;
        let mut attempted = Vec::new();
        let mut current = tier;

        loop {
            attempted.push(current);
            let results = self.run_gates(snapshot, current)?;
            let quality_score = mean_score(&results);

            match results.iter().find(|r| !r.allowed) {
                None => {
                    stats.record_approved(current);
                    if current != tier {
                        info!("{} approved at {} after cascading from {}", symbol, current, tier);
                    } else {
                        debug!("{} approved at {} (quality {:.0})", symbol, current, quality_score);
                    }
                    return Ok(FilterOutcome {
                        allowed: true,
                        final_tier: Some(current),
                        quality_score,
                        reason: format!("Passed all {} quality gates at {}", results.len(), current),
                        attempted_tiers: attempted,
                        gate_results: results,
                    });
                }
                Some(blocked) => {
                    stats.record_block(blocked.gate);
                    debug!(
                        "{} blocked by {} gate at {}: {}",
                        symbol, blocked.gate, current, blocked.reason
                    );

                    let next = if cascades { current.next_lower() } else { None };
                    if let Some(next) = next {
                        stats.record_downgrade();
                        current = next;
                        continue;
                    }

                    stats.record_filter_rejection();
                    let reason = blocked.reason.clone();
                    info!("{} rejected by quality filter: {}", symbol, reason);
                    return Ok(FilterOutcome {
                        allowed: false,
                        final_tier: None,
                        quality_score,
                        reason,
                        attempted_tiers: attempted,
                        gate_results: results,
                    });
                }
            }
        }
    }

    /// Gate results for one tier attempt, stopping after the first block.
    fn run_gates(&self, snapshot: &IndicatorSnapshot, tier: Tier) -> Result<Vec<GateResult>> {
        let thresholds = self.thresholds(tier)?;
        let mut results = Vec::with_capacity(4);

        let trend = gates::trend_structure(snapshot, thresholds, self.config.trend_warning_penalty);
        let blocked = !trend.allowed;
        results.push(trend);
        if blocked {
            return Ok(results);
        }

        let risk = gates::risk_factors(snapshot, thresholds, self.config.risk_flag_penalty)?;
        let blocked = !risk.allowed;
        results.push(risk);
        if blocked {
            return Ok(results);
        }

        let volume = gates::volume_quality(snapshot, thresholds, &self.config.volume_quality);
        let blocked = !volume.allowed;
        results.push(volume);
        if blocked {
            return Ok(results);
        }

        results.push(gates::confirmations(snapshot, thresholds));
        Ok(results)
    }

    fn thresholds(&self, tier: Tier) -> Result<&GateThresholds> {
        self.config
            .gates
            .get(tier)
            .ok_or_else(|| ScoringError::Internal(format!("no gate thresholds for tier {}", tier)))
    }
}

fn mean_score(results: &[GateResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scoring::test_support::premium_snapshot;
    use crate::types::Gate;

    fn breakdown() -> ScoreBreakdown {
        ScoreBreakdown {
            total_score: 100.0,
            contributing_reasons: Vec::new(),
            expected_move: 3.0,
        }
    }

    #[test]
    fn test_premium_passes_all_gates() {
        let filter = QualityFilter::default();
        let stats = StatsAccumulator::new();
        let outcome = filter
            .evaluate("BTC", &breakdown(), &premium_snapshot(), Tier::Premium, &stats)
            .unwrap();

        assert!(outcome.allowed);
        assert_eq!(outcome.final_tier, Some(Tier::Premium));
        assert_eq!(outcome.attempted_tiers, vec![Tier::Premium]);
        assert_eq!(outcome.gate_results.len(), 4);
        assert_eq!(stats.snapshot().approved_by_tier, [1, 0, 0]);
    }

    #[test]
    fn test_premium_cascades_to_moderate() {
        let filter = QualityFilter::default();
        let stats = StatsAccumulator::new();
        let mut snapshot = premium_snapshot();
        snapshot.mfi = Some(30.0);

        let outcome = filter
            .evaluate("BTC", &breakdown(), &snapshot, Tier::Premium, &stats)
            .unwrap();

        assert!(outcome.allowed);
        assert_eq!(outcome.final_tier, Some(Tier::Moderate));
        assert_eq!(outcome.attempted_tiers, vec![Tier::Premium, Tier::Moderate]);

        let counts = stats.snapshot();
        assert_eq!(counts.blocked_by_gate[Gate::RiskFactor.index()], 1);
        assert_eq!(counts.cascade_downgrades, 1);
        assert_eq!(counts.approved_by_tier, [0, 1, 0]);
    }

    #[test]
    fn test_moderate_block_is_terminal() {
        let filter = QualityFilter::default();
        let stats = StatsAccumulator::new();
        let mut snapshot = premium_snapshot();
        snapshot.mfi = Some(20.0);
        snapshot.atr = Some(10.0);

        let outcome = filter
            .evaluate("BTC", &breakdown(), &snapshot, Tier::Moderate, &stats)
            .unwrap();

        assert!(!outcome.allowed);
        assert_eq!(outcome.final_tier, None);
        assert_eq!(outcome.attempted_tiers, vec![Tier::Moderate]);
        assert_eq!(stats.snapshot().rejected_by_filter, 1);
        assert_eq!(stats.snapshot().cascade_downgrades, 0);
    }

    #[test]
    fn test_bearish_structure_rejected_after_full_cascade() {
        let filter = QualityFilter::default();
        let stats = StatsAccumulator::new();
        let mut snapshot = premium_snapshot();
        snapshot.ema20 = Some(95.0);
        snapshot.ema50 = Some(100.0);
        snapshot.ema200 = Some(110.0);

        let outcome = filter
            .evaluate("BTC", &breakdown(), &snapshot, Tier::Premium, &stats)
            .unwrap();

        assert!(!outcome.allowed);
        assert_eq!(
            outcome.attempted_tiers,
            vec![Tier::Premium, Tier::Moderate, Tier::Conservative]
        );
        assert!(outcome.reason.contains("Bearish EMA structure"));
        assert_eq!(outcome.gate_results.len(), 1);
        assert_eq!(stats.snapshot().blocked_by_gate[Gate::TrendStructure.index()], 3);
    }

    #[test]
    fn test_short_circuits_at_first_block() {
        let filter = QualityFilter::default();
        let stats = StatsAccumulator::new();
        let mut snapshot = premium_snapshot();
        snapshot.rsi = Some(90.0);
        snapshot.mfi = Some(10.0);
        snapshot.volume_ratio = Some(0.1);
        snapshot.atr = Some(13.0);

        let outcome = filter
            .evaluate("BTC", &breakdown(), &snapshot, Tier::Conservative, &stats)
            .unwrap();

        assert!(!outcome.allowed);
        assert_eq!(outcome.gate_results.len(), 2);
        assert_eq!(outcome.gate_results[1].gate, Gate::RiskFactor);
        assert_eq!(stats.snapshot().blocked_by_gate[Gate::VolumeQuality.index()], 0);
    }

    #[test]
    fn test_internal_error_propagates() {
        let filter = QualityFilter::default();
        let stats = StatsAccumulator::new();
        let mut snapshot = premium_snapshot();
        snapshot.price = Some(-1.0);
        snapshot.atr = Some(1.0);
        snapshot.ema20 = None;
        snapshot.ema50 = None;
        snapshot.ema200 = None;

        let result = filter.evaluate("BTC", &breakdown(), &snapshot, Tier::Premium, &stats);
        assert!(matches!(result, Err(ScoringError::Internal(_))));
    }

    #[test]
    fn test_rejected_tier_runs_no_gates() {
        let filter = QualityFilter::default();
        let stats = StatsAccumulator::new();
        let outcome = filter
            .evaluate("BTC", &breakdown(), &premium_snapshot(), Tier::Rejected, &stats)
            .unwrap();
        assert!(!outcome.allowed);
        assert!(outcome.attempted_tiers.is_empty());
        assert_eq!(stats.snapshot().total_blocked(), 0);
    }
}
