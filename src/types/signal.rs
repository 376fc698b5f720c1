//! Pipeline stage records: score breakdown, gate results, final signal.

use serde::{Deserialize, Serialize};

use super::indicator::SnapshotSource;
use crate::config::RubricKind;

/// Trading action emitted by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Hold,
    Sell,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Hold => write!(f, "HOLD"),
            Action::Sell => write!(f, "SELL"),
        }
    }
}

/// Quality tier. A lower level means stricter requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Rejected,
    Premium,
    Moderate,
    Conservative,
}

impl Tier {
    /// Numeric level: 1 premium, 2 moderate, 3 conservative, 0 rejected.
    pub fn level(&self) -> u8 {
        match self {
            Tier::Rejected => 0,
            Tier::Premium => 1,
            Tier::Moderate => 2,
            Tier::Conservative => 3,
        }
    }

    /// The next looser tier, if any.
    pub fn next_lower(&self) -> Option<Tier> {
        match self {
            Tier::Premium => Some(Tier::Moderate),
            Tier::Moderate => Some(Tier::Conservative),
            Tier::Conservative | Tier::Rejected => None,
        }
    }

    pub fn is_approved(&self) -> bool {
        !matches!(self, Tier::Rejected)
    }

    /// Index into per-tier tables (premium = 0). None for rejected.
    pub fn index(&self) -> Option<usize> {
        match self {
            Tier::Rejected => None,
            tier => Some(tier.level() as usize - 1),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Rejected => write!(f, "REJECTED"),
            Tier::Premium => write!(f, "PREMIUM"),
            Tier::Moderate => write!(f, "MODERATE"),
            Tier::Conservative => write!(f, "CONSERVATIVE"),
        }
    }
}

/// Output of a confluence rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    /// Total points, clamped to 0-100.
    pub total_score: f64,
    /// Reason per contributing rule, in evaluation order.
    pub contributing_reasons: Vec<String>,
    /// Expected move in percent, never below the configured floor.
    pub expected_move: f64,
}

/// The four quality gates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    TrendStructure,
    RiskFactor,
    VolumeQuality,
    Confirmation,
}

impl Gate {
    pub const ALL: [Gate; 4] = [
        Gate::TrendStructure,
        Gate::RiskFactor,
        Gate::VolumeQuality,
        Gate::Confirmation,
    ];

    pub fn index(&self) -> usize {
        match self {
            Gate::TrendStructure => 0,
            Gate::RiskFactor => 1,
            Gate::VolumeQuality => 2,
            Gate::Confirmation => 3,
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gate::TrendStructure => write!(f, "trend-structure"),
            Gate::RiskFactor => write!(f, "risk-factor"),
            Gate::VolumeQuality => write!(f, "volume-quality"),
            Gate::Confirmation => write!(f, "confirmation"),
        }
    }
}

/// Result of a single gate check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    pub gate: Gate,
    pub allowed: bool,
    pub reason: String,
    /// Gate quality score (0-100).
    pub score: f64,
}

impl GateResult {
    pub fn pass(gate: Gate, score: f64, reason: impl Into<String>) -> Self {
        Self {
            gate,
            allowed: true,
            reason: reason.into(),
            score: score.clamp(0.0, 100.0),
        }
    }

    pub fn block(gate: Gate, score: f64, reason: impl Into<String>) -> Self {
        Self {
            gate,
            allowed: false,
            reason: reason.into(),
            score: score.clamp(0.0, 100.0),
        }
    }
}

/// Outcome of the quality filter cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOutcome {
    pub allowed: bool,
    /// Tier the signal was approved at; None when rejected.
    pub final_tier: Option<Tier>,
    /// Mean gate score of the last attempt.
    pub quality_score: f64,
    pub reason: String,
    /// Tiers evaluated, in order.
    pub attempted_tiers: Vec<Tier>,
    /// Gate results of the last attempt.
    pub gate_results: Vec<GateResult>,
}

/// One take-profit level of an enhanced entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitTarget {
    /// Target move in percent from entry.
    pub percent: f64,
    /// Fraction of the expected move this target represents.
    pub fraction_of_move: f64,
}

/// Result of the entry-enhancement overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Enhancement {
    NotAttempted,
    /// Entry score below the bar; the signal trades in standard mode.
    Standard { entry_score: f64, reason: String },
    Enhanced {
        entry_score: f64,
        profit_targets: Vec<ProfitTarget>,
        stop_loss_percent: f64,
        max_hold_minutes: u32,
    },
    /// The overlay failed internally and left the signal untouched.
    Failed { reason: String },
}

impl Enhancement {
    pub fn is_enhanced(&self) -> bool {
        matches!(self, Enhancement::Enhanced { .. })
    }
}

/// Diagnostic metadata attached to every signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalDiagnostics {
    pub rubric: RubricKind,
    /// Tier assigned by the classifier before any gate ran.
    pub original_tier: Tier,
    /// Confluence score before any adjustment.
    pub original_confidence: f64,
    pub attempted_tiers: Vec<Tier>,
    pub gate_results: Vec<GateResult>,
    pub quality_score: f64,
    pub expected_move: f64,
    pub risk_reward: f64,
    pub data_quality: SnapshotSource,
    pub enhancement: Enhancement,
}

/// Final trading signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub symbol: String,
    pub action: Action,
    /// Confidence (0-100).
    pub confidence: f64,
    /// Approved tier; None unless the signal passed the quality filter.
    pub tier: Option<Tier>,
    /// Zero unless the action is BUY.
    pub position_size_percent: f64,
    pub stop_loss_percent: f64,
    pub take_profit_percent: f64,
    pub reasoning: Vec<String>,
    /// Snapshot timestamp (ms) the signal was derived from.
    pub timestamp: i64,
    pub diagnostics: SignalDiagnostics,
}

impl Signal {
    pub fn is_buy(&self) -> bool {
        self.action == Action::Buy
    }

    pub fn is_hold(&self) -> bool {
        self.action == Action::Hold
    }

    pub fn is_sell(&self) -> bool {
        self.action == Action::Sell
    }
}
