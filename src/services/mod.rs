pub mod batcher;
pub mod enhancement;
pub mod filter;
pub mod history;
pub mod scorer;
pub mod scoring;
pub mod snapshot_cache;
pub mod stats;
pub mod supplier;

pub use batcher::IndicatorBatcher;
pub use enhancement::EntryEnhancer;
pub use filter::QualityFilter;
pub use history::SignalHistory;
pub use scorer::SignalScorer;
pub use scoring::{ConfluenceScorer, RuleCredit, ScoringRule, TierClassifier};
pub use snapshot_cache::SnapshotCache;
pub use stats::StatsAccumulator;
pub use supplier::{IndicatorService, IndicatorSupplier, NoSupplier};
