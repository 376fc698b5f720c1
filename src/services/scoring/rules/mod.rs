//! Confluence rule implementations.

pub mod adx;
pub mod ema;
pub mod extension;
pub mod macd;
pub mod rsi;
pub mod volume;

pub use adx::AdxRule;
pub use ema::EmaStructureRule;
pub use extension::ExtensionRule;
pub use macd::MacdRule;
pub use rsi::RsiRule;
pub use volume::VolumeRule;

use super::ScoringRule;

/// Get all confluence rules, in scoring order.
pub fn all_rules() -> Vec<Box<dyn ScoringRule>> {
    vec![
        // Momentum
        Box::new(RsiRule),
        Box::new(MacdRule),
        // Trend structure
        Box::new(EmaStructureRule),
        // Participation
        Box::new(VolumeRule),
        // Trend strength
        Box::new(AdxRule),
        // Bonus
        Box::new(ExtensionRule),
    ]
}
