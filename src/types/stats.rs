use serde::{Deserialize, Serialize};

/// Point-in-time copy of the scoring counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Signals run through the pipeline.
    pub total_checked: u64,
    /// Approvals per tier: [premium, moderate, conservative].
    pub approved_by_tier: [u64; 3],
    /// Blocks per gate: [trend-structure, risk-factor, volume-quality, confirmation].
    /// Counted once per tier attempt.
    pub blocked_by_gate: [u64; 4],
    /// Signals the classifier rejected before any gate ran.
    pub rejected_by_classifier: u64,
    /// Signals rejected after every permitted tier attempt failed.
    pub rejected_by_filter: u64,
    /// Premium signals approved at a looser tier.
    pub cascade_downgrades: u64,
    /// Signals scored from fallback data.
    pub fallback_data: u64,
    /// Internal errors swallowed by the pipeline.
    pub internal_errors: u64,
    /// BUY signals the entry overlay enhanced.
    pub enhanced: u64,
}

impl StatsSnapshot {
    pub fn total_approved(&self) -> u64 {
        self.approved_by_tier.iter().sum()
    }

    pub fn total_blocked(&self) -> u64 {
        self.blocked_by_gate.iter().sum()
    }

    /// Share of checked signals that were approved (0-100).
    pub fn approval_rate(&self) -> f64 {
        if self.total_checked == 0 {
            0.0
        } else {
            self.total_approved() as f64 / self.total_checked as f64 * 100.0
        }
    }
}

/// Rolling statistics over the recent signal history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_signals: usize,
    pub buys: usize,
    pub holds: usize,
    pub sells: usize,
    /// BUY signals per tier: [premium, moderate, conservative].
    pub buys_by_tier: [usize; 3],
    pub average_confidence: f64,
    /// Average confidence over BUY signals only.
    pub average_buy_confidence: f64,
    /// Share of signals that were BUY (0-100).
    pub buy_rate: f64,
    pub symbols: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_symbol: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_rate() {
        let stats = StatsSnapshot {
            total_checked: 8,
            approved_by_tier: [1, 2, 1],
            ..Default::default()
        };
        assert_eq!(stats.total_approved(), 4);
        assert!((stats.approval_rate() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_approval_rate_empty() {
        assert_eq!(StatsSnapshot::default().approval_rate(), 0.0);
    }
}
