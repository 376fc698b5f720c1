use thiserror::Error;

/// Scoring pipeline error types.
///
/// None of these reach the caller of `SignalScorer::score_signal`: data and
/// supplier errors degrade to fallback scoring, internal errors degrade to a
/// HOLD (gate cascade) or to the unenhanced signal (entry overlay).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Indicator data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Indicator supplier rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Indicator supplier timed out after {0}ms")]
    Timeout(u64),

    #[error("Internal scoring error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ScoringError>;
