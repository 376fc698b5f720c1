//! Indicator supplier boundary.
//!
//! The scorer never computes indicators itself. It asks an
//! [`IndicatorSupplier`] and degrades to fallback data whenever the supplier
//! is slow, throttled or down.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::SupplierConfig;
use crate::error::{Result, ScoringError};
use crate::services::snapshot_cache::SnapshotCache;
use crate::types::{IndicatorData, IndicatorSnapshot};

/// Source of precomputed technical indicators.
pub trait IndicatorSupplier: Send + Sync {
    /// Indicators for each requested symbol. Symbols the supplier cannot
    /// serve may be answered with `IndicatorData::Fallback` or left out.
    fn get_indicators<'a>(
        &'a self,
        symbols: &'a [String],
        timeframe: &'a str,
        exchange: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<String, IndicatorData>>> + Send + 'a>>;
}

/// Supplier that has nothing; every symbol resolves to fallback data.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSupplier;

impl IndicatorSupplier for NoSupplier {
    fn get_indicators<'a>(
        &'a self,
        _symbols: &'a [String],
        _timeframe: &'a str,
        _exchange: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<String, IndicatorData>>> + Send + 'a>> {
        Box::pin(async {
            Err(ScoringError::DataUnavailable(
                "no indicator supplier configured".to_string(),
            ))
        })
    }
}

/// Caching, retrying front for an [`IndicatorSupplier`].
pub struct IndicatorService {
    supplier: Arc<dyn IndicatorSupplier>,
    cache: SnapshotCache,
    config: SupplierConfig,
}

impl IndicatorService {
    pub fn new(supplier: Arc<dyn IndicatorSupplier>, config: SupplierConfig) -> Self {
        Self {
            supplier,
            cache: SnapshotCache::new(Duration::from_secs(config.cache_ttl_secs)),
            config,
        }
    }

    pub fn config(&self) -> &SupplierConfig {
        &self.config
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Snapshot for one symbol. Never fails.
    pub async fn snapshot(&self, symbol: &str) -> IndicatorSnapshot {
        let symbols = [symbol.to_uppercase()];
        let mut resolved = self.snapshots(&symbols).await;
        resolved
            .remove(&symbols[0])
            .unwrap_or_else(|| IndicatorSnapshot::fallback(symbol, &self.config.timeframe, "no data"))
    }

    /// Snapshots for several symbols, keyed by uppercase symbol.
    ///
    /// Cached snapshots are served directly; the rest are fetched in one
    /// supplier call. Every requested symbol gets an entry, falling back to a
    /// degraded snapshot when the supplier cannot help.
    pub async fn snapshots(&self, symbols: &[String]) -> HashMap<String, IndicatorSnapshot> {
        let timeframe = self.config.timeframe.as_str();
        let mut out = HashMap::with_capacity(symbols.len());
        let mut missing: Vec<String> = Vec::new();

        for symbol in symbols {
            let symbol = symbol.to_uppercase();
            if out.contains_key(&symbol) || missing.contains(&symbol) {
                continue;
            }
            match self.cache.get(&symbol, timeframe) {
                Some(snapshot) => {
                    out.insert(symbol, snapshot);
                }
                None => missing.push(symbol),
            }
        }

        if missing.is_empty() {
            return out;
        }

        debug!("Fetching indicators for {} symbol(s) ({} cached)", missing.len(), out.len());

        match self.fetch_with_retry(&missing).await {
            Ok(mut fetched) => {
                for symbol in missing {
                    let snapshot = match fetched.remove(&symbol) {
                        Some(data) => {
                            let mut snapshot = data.into_snapshot(&symbol, timeframe);
                            snapshot.symbol = symbol.clone();
                            snapshot.timeframe = timeframe.to_string();
                            self.cache.insert(&symbol, timeframe, snapshot.clone());
                            snapshot
                        }
                        None => IndicatorSnapshot::fallback(
                            &symbol,
                            timeframe,
                            "supplier returned no data for symbol",
                        ),
                    };
                    out.insert(symbol, snapshot);
                }
            }
            Err(e) => {
                warn!("Indicator supplier failed, using fallback data: {}", e);
                let reason = e.to_string();
                for symbol in missing {
                    let snapshot = IndicatorSnapshot::fallback(&symbol, timeframe, &reason);
                    out.insert(symbol, snapshot);
                }
            }
        }

        out
    }

    async fn fetch_with_retry(&self, symbols: &[String]) -> Result<HashMap<String, IndicatorData>> {
        match self.fetch(symbols).await {
            Err(ScoringError::RateLimited { retry_after_ms }) => {
                let wait = retry_after_ms.unwrap_or(self.config.retry_backoff_ms);
                info!("Indicator supplier rate limited, retrying once in {}ms", wait);
                tokio::time::sleep(Duration::from_millis(wait)).await;
                self.fetch(symbols).await
            }
            other => other,
        }
    }

    async fn fetch(&self, symbols: &[String]) -> Result<HashMap<String, IndicatorData>> {
        let timeout_ms = self.config.request_timeout_ms;
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.supplier
                .get_indicators(symbols, &self.config.timeframe, &self.config.exchange),
        )
        .await
        {
            Ok(Ok(data)) => Ok(data
                .into_iter()
                .map(|(symbol, data)| (symbol.to_uppercase(), data))
                .collect()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ScoringError::Timeout(timeout_ms)),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted supplier: pops one canned response per call, then repeats
    /// the last one.
    pub struct ScriptedSupplier {
        responses: Mutex<Vec<Result<HashMap<String, IndicatorData>>>>,
        pub calls: AtomicUsize,
        pub requested: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedSupplier {
        pub fn new(mut responses: Vec<Result<HashMap<String, IndicatorData>>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl IndicatorSupplier for ScriptedSupplier {
        fn get_indicators<'a>(
            &'a self,
            symbols: &'a [String],
            _timeframe: &'a str,
            _exchange: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<HashMap<String, IndicatorData>>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(symbols.to_vec());
            let mut responses = self.responses.lock().unwrap();
            let response = if responses.len() > 1 {
                responses.pop().unwrap()
            } else {
                responses.last().cloned().unwrap()
            };
            Box::pin(async move { response })
        }
    }
}
