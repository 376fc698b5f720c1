//! Confluence - tiered rule-based scoring for cryptocurrency trading signals

pub mod config;
pub mod error;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use config::{RiskLevel, RubricKind, ScorerConfig};
pub use error::{Result, ScoringError};
pub use services::{IndicatorSupplier, SignalScorer};
pub use types::*;
