//! Bounded history of recent signals.

use std::collections::{HashSet, VecDeque};
use std::sync::RwLock;

use crate::types::{Action, PerformanceSummary, Signal};

/// Ring buffer holding the last `capacity` signals.
pub struct SignalHistory {
    signals: RwLock<VecDeque<Signal>>,
    capacity: usize,
}

impl SignalHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            signals: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a signal, evicting the oldest when full.
    pub fn push(&self, signal: Signal) {
        let mut signals = self.signals.write().unwrap_or_else(|e| e.into_inner());
        signals.push_back(signal);
        while signals.len() > self.capacity {
            signals.pop_front();
        }
    }

    /// Most recent signals, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Signal> {
        let signals = self.signals.read().unwrap_or_else(|e| e.into_inner());
        signals.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.signals.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rolling statistics over the buffered signals.
    pub fn summary(&self) -> PerformanceSummary {
        let signals = self.signals.read().unwrap_or_else(|e| e.into_inner());
        if signals.is_empty() {
            return PerformanceSummary::default();
        }

        let mut summary = PerformanceSummary {
            total_signals: signals.len(),
            ..Default::default()
        };
        let mut confidence_sum = 0.0;
        let mut buy_confidence_sum = 0.0;
        let mut symbols = HashSet::new();

        for signal in signals.iter() {
            confidence_sum += signal.confidence;
            symbols.insert(signal.symbol.as_str());
            match signal.action {
                Action::Buy => {
                    summary.buys += 1;
                    buy_confidence_sum += signal.confidence;
                    if let Some(idx) = signal.tier.and_then(|t| t.index()) {
                        summary.buys_by_tier[idx] += 1;
                    }
                }
                Action::Hold => summary.holds += 1,
                Action::Sell => summary.sells += 1,
            }
        }

        summary.average_confidence = confidence_sum / signals.len() as f64;
        if summary.buys > 0 {
            summary.average_buy_confidence = buy_confidence_sum / summary.buys as f64;
        }
        summary.buy_rate = summary.buys as f64 / signals.len() as f64 * 100.0;
        summary.symbols = symbols.len();
        summary.last_symbol = signals.back().map(|s| s.symbol.clone());
        summary
    }
}
