//! Signal assembler.
//!
//! Drives a snapshot through confluence scoring, tier classification, the
//! quality filter cascade and the entry overlay, and turns the outcome into a
//! [`Signal`]. Scoring never fails: every error path ends in a HOLD.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ScorerConfig;
use crate::error::Result;
use crate::services::batcher::IndicatorBatcher;
use crate::services::enhancement::EntryEnhancer;
use crate::services::filter::QualityFilter;
use crate::services::history::SignalHistory;
use crate::services::scoring::{ConfluenceScorer, TierClassifier};
use crate::services::stats::StatsAccumulator;
use crate::services::supplier::{IndicatorService, IndicatorSupplier, NoSupplier};
use crate::types::{
    Action, Enhancement, FilterOutcome, IndicatorSnapshot, MarketData, PerformanceSummary,
    ScoreBreakdown, Signal, SignalDiagnostics, StatsSnapshot, Tier,
};

/// Rule-based trading signal scorer.
pub struct SignalScorer {
    config: ScorerConfig,
    confluence: ConfluenceScorer,
    classifier: TierClassifier,
    filter: QualityFilter,
    enhancer: EntryEnhancer,
    indicators: Arc<IndicatorService>,
    batcher: Option<IndicatorBatcher>,
    stats: StatsAccumulator,
    history: SignalHistory,
}

impl SignalScorer {
    /// Create a scorer without an indicator supplier. Calls that carry no
    /// pre-fetched snapshot score fallback data until one is attached.
    pub fn new(config: ScorerConfig) -> Self {
        let indicators = Arc::new(IndicatorService::new(
            Arc::new(NoSupplier),
            config.supplier.clone(),
        ));

        Self {
            confluence: ConfluenceScorer::new(),
            classifier: TierClassifier::new(config.classifier.clone(), config.defaults.clone()),
            filter: QualityFilter::new(config.filter.clone()),
            enhancer: EntryEnhancer::new(config.enhancement.clone()),
            indicators,
            batcher: None,
            stats: StatsAccumulator::new(),
            history: SignalHistory::new(config.history_capacity),
            config,
        }
    }

    /// Validate `config` before building the scorer. A config that passes
    /// guarantees positive position sizes and an ordered tier ladder.
    pub fn try_new(config: ScorerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Fetch missing snapshots from `supplier`.
    pub fn with_supplier(mut self, supplier: Arc<dyn IndicatorSupplier>) -> Self {
        self.indicators = Arc::new(IndicatorService::new(supplier, self.config.supplier.clone()));
        self.batcher = None;
        self
    }

    /// Coalesce concurrent supplier lookups into bulk calls.
    ///
    /// Spawns a background task, so it must be called inside a tokio runtime.
    pub fn with_batching(mut self) -> Self {
        self.batcher = Some(IndicatorBatcher::spawn(self.indicators.clone()));
        self
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Score a symbol, fetching indicators when `market_data` has none.
    pub async fn score_signal(&self, symbol: &str, market_data: MarketData) -> Signal {
        let snapshot = match market_data.technical_data {
            Some(snapshot) => snapshot,
            None => match &self.batcher {
                Some(batcher) => batcher.request(symbol).await,
                None => self.indicators.snapshot(symbol).await,
            },
        };

        self.score_snapshot(symbol, &snapshot, market_data.current_price)
    }

    /// Score an already fetched snapshot.
    ///
    /// A valid `current_price` takes precedence over the snapshot's own price.
    pub fn score_snapshot(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        current_price: f64,
    ) -> Signal {
        self.stats.record_checked();

        let symbol = symbol.to_uppercase();
        let mut snapshot = snapshot.sanitized();
        if current_price.is_finite() && current_price > 0.0 {
            snapshot.price = Some(current_price);
        }

        let signal = self.assemble(&symbol, &snapshot);

        info!(
            "{} -> {} (confidence {:.1}, tier {})",
            signal.symbol,
            signal.action,
            signal.confidence,
            signal.tier.map(|t| t.to_string()).unwrap_or_else(|| "none".to_string())
        );

        self.history.push(signal.clone());
        signal
    }

    fn assemble(&self, symbol: &str, snapshot: &IndicatorSnapshot) -> Signal {
        let rubric = self.config.rubric_config();
        let breakdown = self.confluence.score(snapshot, rubric);

        if snapshot.is_fallback() {
            self.stats.record_fallback();
            let note = snapshot.note.as_deref().unwrap_or("supplier unavailable");
            warn!("Scoring {} on fallback data: {}", symbol, note);
            return self.hold(
                symbol,
                snapshot,
                &breakdown,
                Tier::Rejected,
                breakdown.total_score,
                format!("degraded indicator data: {}", note),
            );
        }

        let tier = self.classifier.classify(breakdown.total_score, snapshot);

        if !tier.is_approved() {
            self.stats.record_classifier_rejection();
            if self.is_decisively_bearish(snapshot) {
                return self.sell(symbol, snapshot, &breakdown);
            }
            return self.hold(
                symbol,
                snapshot,
                &breakdown,
                tier,
                breakdown.total_score,
                format!(
                    "Confluence score {:.1} did not meet any tier requirements",
                    breakdown.total_score
                ),
            );
        }

        match self
            .filter
            .evaluate(symbol, &breakdown, snapshot, tier, &self.stats)
        {
            Ok(outcome) => match outcome.final_tier.filter(|_| outcome.allowed) {
                Some(final_tier) => {
                    let signal = self.buy(symbol, snapshot, &breakdown, tier, final_tier, &outcome);
                    let signal = self.enhancer.enhance(symbol, signal, snapshot, &breakdown);
                    if signal.diagnostics.enhancement.is_enhanced() {
                        self.stats.record_enhanced();
                    }
                    signal
                }
                None => {
                    let mut signal = self.hold(
                        symbol,
                        snapshot,
                        &breakdown,
                        tier,
                        breakdown.total_score,
                        outcome.reason.clone(),
                    );
                    attach_outcome(&mut signal.diagnostics, outcome);
                    signal
                }
            },
            Err(e) => {
                self.stats.record_internal_error();
                warn!("Quality filter failed for {}, holding: {}", symbol, e);
                self.hold(
                    symbol,
                    snapshot,
                    &breakdown,
                    tier,
                    breakdown.total_score * self.config.filter.error_confidence_factor,
                    format!("internal scoring error: {}", e),
                )
            }
        }
    }

    fn is_decisively_bearish(&self, snapshot: &IndicatorSnapshot) -> bool {
        let sizing = &self.config.sizing;
        sizing.emit_sell_signals
            && snapshot.has_bearish_ema_order()
            && snapshot.macd.map_or(false, |m| m.histogram < 0.0)
            && snapshot.rsi.map_or(false, |r| r < sizing.sell_rsi_below)
    }

    fn buy(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        breakdown: &ScoreBreakdown,
        original_tier: Tier,
        tier: Tier,
        outcome: &FilterOutcome,
    ) -> Signal {
        let sizing = &self.config.sizing;
        let base = sizing.base_position_percent.get(tier).copied().unwrap_or(0.0);
        let position_size_percent =
            (base * sizing.risk_level.position_multiplier()).min(sizing.max_position_percent);
        let stop_loss_percent = sizing.stop_loss_percent.get(tier).copied().unwrap_or(0.0);
        let take_profit_percent = breakdown.expected_move;

        let mut reasoning = breakdown.contributing_reasons.clone();
        if tier != original_tier {
            reasoning.push(format!("Downgraded from {} to {} by quality filter", original_tier, tier));
        }
        reasoning.push(outcome.reason.clone());

        debug!(
            "{} BUY at {}: size {:.2}%, stop {:.2}%, target {:.2}%",
            symbol, tier, position_size_percent, stop_loss_percent, take_profit_percent
        );

        let mut diagnostics = self.diagnostics(snapshot, breakdown, original_tier);
        if stop_loss_percent > 0.0 {
            diagnostics.risk_reward = take_profit_percent / stop_loss_percent;
        }
        attach_outcome(&mut diagnostics, outcome.clone());

        Signal {
            symbol: symbol.to_string(),
            action: Action::Buy,
            confidence: breakdown.total_score.clamp(0.0, 100.0),
            tier: Some(tier),
            position_size_percent,
            stop_loss_percent,
            take_profit_percent,
            reasoning,
            timestamp: snapshot.timestamp,
            diagnostics,
        }
    }

    fn sell(&self, symbol: &str, snapshot: &IndicatorSnapshot, breakdown: &ScoreBreakdown) -> Signal {
        let mut reasoning = breakdown.contributing_reasons.clone();
        reasoning.push("Bearish EMA ordering with negative MACD histogram and weak RSI".to_string());

        Signal {
            symbol: symbol.to_string(),
            action: Action::Sell,
            confidence: (100.0 - breakdown.total_score).clamp(0.0, 100.0),
            tier: None,
            position_size_percent: 0.0,
            stop_loss_percent: 0.0,
            take_profit_percent: 0.0,
            reasoning,
            timestamp: snapshot.timestamp,
            diagnostics: self.diagnostics(snapshot, breakdown, Tier::Rejected),
        }
    }

    fn hold(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        breakdown: &ScoreBreakdown,
        original_tier: Tier,
        confidence: f64,
        reason: String,
    ) -> Signal {
        let mut reasoning = breakdown.contributing_reasons.clone();
        reasoning.push(reason);

        Signal {
            symbol: symbol.to_string(),
            action: Action::Hold,
            confidence: confidence.clamp(0.0, 100.0),
            tier: None,
            position_size_percent: 0.0,
            stop_loss_percent: 0.0,
            take_profit_percent: 0.0,
            reasoning,
            timestamp: snapshot.timestamp,
            diagnostics: self.diagnostics(snapshot, breakdown, original_tier),
        }
    }

    fn diagnostics(
        &self,
        snapshot: &IndicatorSnapshot,
        breakdown: &ScoreBreakdown,
        original_tier: Tier,
    ) -> SignalDiagnostics {
        SignalDiagnostics {
            rubric: self.config.rubric,
            original_tier,
            original_confidence: breakdown.total_score,
            attempted_tiers: Vec::new(),
            gate_results: Vec::new(),
            quality_score: 0.0,
            expected_move: breakdown.expected_move,
            risk_reward: 0.0,
            data_quality: snapshot.source,
            enhancement: Enhancement::NotAttempted,
        }
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Zero every counter. Signal history is kept.
    pub fn reset_stats(&self) {
        self.stats.reset();
        info!("Scoring stats reset");
    }

    /// Rolling summary over the recent signal history.
    pub fn performance_summary(&self) -> PerformanceSummary {
        self.history.summary()
    }

    /// Most recent signals, newest first.
    pub fn recent_signals(&self, limit: usize) -> Vec<Signal> {
        self.history.recent(limit)
    }
}

impl Default for SignalScorer {
    fn default() -> Self {
        Self::new(ScorerConfig::default())
    }
}

fn attach_outcome(diagnostics: &mut SignalDiagnostics, outcome: FilterOutcome) {
    diagnostics.attempted_tiers = outcome.attempted_tiers;
    diagnostics.gate_results = outcome.gate_results;
    diagnostics.quality_score = outcome.quality_score;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskLevel;
    use crate::services::scoring::test_support::premium_snapshot;
    use crate::types::MacdValues;

    fn bearish_snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            ema20: Some(95.0),
            ema50: Some(100.0),
            ema200: Some(110.0),
            ..premium_snapshot()
        }
    }

    #[test]
    fn test_try_new_rejects_invalid_config() {
        let mut config = ScorerConfig::default();
        config.sizing.base_position_percent.moderate = 0.0;
        assert!(SignalScorer::try_new(config).is_err());

        let mut config = ScorerConfig::default();
        config.classifier.premium.min_score = 50.0;
        assert!(SignalScorer::try_new(config).is_err());

        assert!(SignalScorer::try_new(ScorerConfig::default()).is_ok());
    }

    #[test]
    fn test_premium_buy() {
        let scorer = SignalScorer::default();
        let signal = scorer.score_snapshot("btc", &premium_snapshot(), 0.0);

        assert_eq!(signal.symbol, "BTC");
        assert_eq!(signal.action, Action::Buy);
        assert_eq!(signal.tier, Some(Tier::Premium));
        assert_eq!(signal.confidence, 100.0);
        assert_eq!(signal.position_size_percent, 5.0);
        assert_eq!(signal.diagnostics.gate_results.len(), 4);
        assert!(signal.diagnostics.gate_results.iter().all(|g| g.allowed));
        assert!(signal.diagnostics.enhancement.is_enhanced());
        assert_eq!(signal.timestamp, 1_700_000_000_000);

        let stats = scorer.stats();
        assert_eq!(stats.total_checked, 1);
        assert_eq!(stats.approved_by_tier, [1, 0, 0]);
        assert_eq!(stats.enhanced, 1);
    }

    #[test]
    fn test_bearish_structure_holds() {
        let scorer = SignalScorer::default();
        let signal = scorer.score_snapshot("BTC", &bearish_snapshot(), 0.0);

        assert_eq!(signal.action, Action::Hold);
        assert_eq!(signal.tier, None);
        assert_eq!(signal.position_size_percent, 0.0);
        assert!(signal
            .reasoning
            .last()
            .map_or(false, |r| r.contains("Bearish EMA structure")));
        assert_eq!(
            signal.diagnostics.attempted_tiers,
            vec![Tier::Premium, Tier::Moderate, Tier::Conservative]
        );
        assert_eq!(signal.diagnostics.original_tier, Tier::Premium);
    }

    #[test]
    fn test_fallback_holds_with_note() {
        let scorer = SignalScorer::default();
        let snapshot = IndicatorSnapshot::fallback("ETH", "1h", "rate limited");
        let signal = scorer.score_snapshot("ETH", &snapshot, 2000.0);

        assert!(signal.is_hold());
        assert!(signal
            .reasoning
            .iter()
            .any(|r| r.starts_with("degraded indicator data")));
        assert_eq!(scorer.stats().fallback_data, 1);
    }

    #[test]
    fn test_decisive_bearish_sells() {
        let scorer = SignalScorer::default();
        let snapshot = IndicatorSnapshot {
            rsi: Some(38.0),
            macd: Some(MacdValues { macd: -1.0, signal: -0.5, histogram: -0.5 }),
            adx: Some(10.0),
            volume_ratio: Some(0.6),
            ..bearish_snapshot()
        };
        let signal = scorer.score_snapshot("BTC", &snapshot, 90.0);

        assert!(signal.is_sell());
        assert_eq!(signal.position_size_percent, 0.0);
        assert_eq!(signal.tier, None);
    }

    #[test]
    fn test_sell_can_be_disabled() {
        let mut config = ScorerConfig::default();
        config.sizing.emit_sell_signals = false;
        let scorer = SignalScorer::new(config);
        let snapshot = IndicatorSnapshot {
            rsi: Some(38.0),
            macd: Some(MacdValues { macd: -1.0, signal: -0.5, histogram: -0.5 }),
            adx: Some(10.0),
            volume_ratio: Some(0.6),
            ..bearish_snapshot()
        };
        assert!(scorer.score_snapshot("BTC", &snapshot, 90.0).is_hold());
    }

    #[test]
    fn test_internal_error_fails_closed() {
        let scorer = SignalScorer::default();
        let snapshot = IndicatorSnapshot {
            price: Some(-5.0),
            atr: Some(1.0),
            ema20: None,
            ema50: None,
            ema200: None,
            ..premium_snapshot()
        };
        let signal = scorer.score_snapshot("BTC", &snapshot, 0.0);

        assert!(signal.is_hold());
        assert_eq!(signal.position_size_percent, 0.0);
        assert!(signal.confidence < signal.diagnostics.original_confidence);
        assert!(signal.reasoning.iter().any(|r| r.contains("internal scoring error")));
        assert_eq!(scorer.stats().internal_errors, 1);
    }

    #[test]
    fn test_risk_level_scales_and_caps_size() {
        let mut config = ScorerConfig::default();
        config.sizing.risk_level = RiskLevel::Conservative;
        let scorer = SignalScorer::new(config.clone());
        assert_eq!(scorer.score_snapshot("BTC", &premium_snapshot(), 0.0).position_size_percent, 2.5);

        config.sizing.risk_level = RiskLevel::Aggressive;
        let scorer = SignalScorer::new(config);
        assert_eq!(scorer.score_snapshot("BTC", &premium_snapshot(), 0.0).position_size_percent, 5.0);
    }

    #[test]
    fn test_current_price_overrides_snapshot() {
        let scorer = SignalScorer::default();
        // Far below every EMA: trend gate blocks at every tier
        let signal = scorer.score_snapshot("BTC", &premium_snapshot(), 80.0);
        assert!(signal.is_hold());
    }

    #[test]
    fn test_history_and_reset() {
        let scorer = SignalScorer::default();
        scorer.score_snapshot("BTC", &premium_snapshot(), 0.0);
        scorer.score_snapshot("ETH", &bearish_snapshot(), 0.0);

        let recent = scorer.recent_signals(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].symbol, "ETH");

        let summary = scorer.performance_summary();
        assert_eq!(summary.buys, 1);
        assert_eq!(summary.holds, 1);

        scorer.reset_stats();
        assert_eq!(scorer.stats().total_checked, 0);
        assert_eq!(scorer.recent_signals(10).len(), 2);
    }
}
