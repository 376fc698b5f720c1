//! Process-wide scoring counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{Gate, StatsSnapshot, Tier};

/// Lock-free counters shared by every scoring call.
///
/// Owned by the scorer and handed to pipeline stages by reference, so
/// independent scorers never share counts.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    total_checked: AtomicU64,
    approved_by_tier: [AtomicU64; 3],
    blocked_by_gate: [AtomicU64; 4],
    rejected_by_classifier: AtomicU64,
    rejected_by_filter: AtomicU64,
    cascade_downgrades: AtomicU64,
    fallback_data: AtomicU64,
    internal_errors: AtomicU64,
    enhanced: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_checked(&self) {
        bump(&self.total_checked);
    }

    pub fn record_approved(&self, tier: Tier) {
        if let Some(idx) = tier.index() {
            bump(&self.approved_by_tier[idx]);
        }
    }

    pub fn record_block(&self, gate: Gate) {
        bump(&self.blocked_by_gate[gate.index()]);
    }

    pub fn record_classifier_rejection(&self) {
        bump(&self.rejected_by_classifier);
    }

    pub fn record_filter_rejection(&self) {
        bump(&self.rejected_by_filter);
    }

    pub fn record_downgrade(&self) {
        bump(&self.cascade_downgrades);
    }

    pub fn record_fallback(&self) {
        bump(&self.fallback_data);
    }

    pub fn record_internal_error(&self) {
        bump(&self.internal_errors);
    }

    pub fn record_enhanced(&self) {
        bump(&self.enhanced);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            total_checked: load(&self.total_checked),
            approved_by_tier: [
                load(&self.approved_by_tier[0]),
                load(&self.approved_by_tier[1]),
                load(&self.approved_by_tier[2]),
            ],
            blocked_by_gate: [
                load(&self.blocked_by_gate[0]),
                load(&self.blocked_by_gate[1]),
                load(&self.blocked_by_gate[2]),
                load(&self.blocked_by_gate[3]),
            ],
            rejected_by_classifier: load(&self.rejected_by_classifier),
            rejected_by_filter: load(&self.rejected_by_filter),
            cascade_downgrades: load(&self.cascade_downgrades),
            fallback_data: load(&self.fallback_data),
            internal_errors: load(&self.internal_errors),
            enhanced: load(&self.enhanced),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        let counters = [
            &self.total_checked,
            &self.rejected_by_classifier,
            &self.rejected_by_filter,
            &self.cascade_downgrades,
            &self.fallback_data,
            &self.internal_errors,
            &self.enhanced,
        ];
        for counter in counters
            .into_iter()
            .chain(self.approved_by_tier.iter())
            .chain(self.blocked_by_gate.iter())
        {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
