//! Request coalescing in front of the indicator service.
//!
//! Concurrent single-symbol lookups are collected for a short window and sent
//! to the supplier as one bulk call, then fanned back out to each caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::services::supplier::IndicatorService;
use crate::types::IndicatorSnapshot;

struct BatchRequest {
    symbol: String,
    reply: oneshot::Sender<IndicatorSnapshot>,
}

/// Handle to the background batching task. Cheap to clone.
#[derive(Clone)]
pub struct IndicatorBatcher {
    tx: mpsc::UnboundedSender<BatchRequest>,
    timeframe: String,
}

impl IndicatorBatcher {
    /// Spawn the batching task on the current tokio runtime.
    pub fn spawn(service: Arc<IndicatorService>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let timeframe = service.config().timeframe.clone();
        let window = Duration::from_millis(service.config().batch_window_ms);
        let max_batch = service.config().max_batch_size.max(1);

        tokio::spawn(run(service, rx, window, max_batch));

        Self { tx, timeframe }
    }

    /// Snapshot for `symbol`, fetched as part of the next batch.
    pub async fn request(&self, symbol: &str) -> IndicatorSnapshot {
        let symbol = symbol.to_uppercase();
        let (reply, rx) = oneshot::channel();

        if self
            .tx
            .send(BatchRequest {
                symbol: symbol.clone(),
                reply,
            })
            .is_err()
        {
            warn!("Indicator batcher stopped, using fallback for {}", symbol);
            return IndicatorSnapshot::fallback(&symbol, &self.timeframe, "indicator batcher stopped");
        }

        match rx.await {
            Ok(snapshot) => snapshot,
            Err(_) => IndicatorSnapshot::fallback(&symbol, &self.timeframe, "indicator batch dropped"),
        }
    }
}

async fn run(
    service: Arc<IndicatorService>,
    mut rx: mpsc::UnboundedReceiver<BatchRequest>,
    window: Duration,
    max_batch: usize,
) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        let deadline = Instant::now() + window;

        while batch.len() < max_batch {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(request)) => batch.push(request),
                Ok(None) | Err(_) => break,
            }
        }

        dispatch(&service, batch).await;
    }

    debug!("Indicator batcher shutting down");
}

async fn dispatch(service: &IndicatorService, batch: Vec<BatchRequest>) {
    let symbols: Vec<String> = batch.iter().map(|r| r.symbol.clone()).collect();
    debug!("Dispatching indicator batch of {} request(s)", batch.len());

    let resolved = service.snapshots(&symbols).await;
    let timeframe = service.config().timeframe.as_str();

    for request in batch {
        let snapshot = resolved.get(&request.symbol).cloned().unwrap_or_else(|| {
            IndicatorSnapshot::fallback(&request.symbol, timeframe, "missing from indicator batch")
        });
        if request.reply.send(snapshot).is_err() {
            debug!("Caller for {} dropped before its batch resolved", request.symbol);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupplierConfig;
    use crate::error::ScoringError;
    use crate::services::scoring::test_support::premium_snapshot;
    use crate::services::supplier::test_support::ScriptedSupplier;
    use crate::types::IndicatorData;
    use futures_util::future::join_all;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    fn data_for(symbols: &[&str]) -> HashMap<String, IndicatorData> {
        symbols
            .iter()
            .map(|s| {
                let mut snapshot = premium_snapshot();
                snapshot.symbol = s.to_string();
                (s.to_string(), IndicatorData::Snapshot(snapshot))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_call() {
        let supplier = Arc::new(ScriptedSupplier::new(vec![Ok(data_for(&["BTC", "ETH", "SOL"]))]));
        let service = Arc::new(IndicatorService::new(supplier.clone(), SupplierConfig::default()));
        let batcher = IndicatorBatcher::spawn(service);

        let results = join_all(["btc", "eth", "sol"].iter().map(|s| batcher.request(*s))).await;

        assert_eq!(supplier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(supplier.requested.lock().unwrap()[0].len(), 3);
        let symbols: Vec<&str> = results.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "SOL"]);
        assert!(results.iter().all(|s| !s.is_fallback()));
    }

    #[tokio::test]
    async fn test_batch_size_limit() {
        let supplier = Arc::new(ScriptedSupplier::new(vec![Ok(data_for(&["A", "B", "C"]))]));
        let config = SupplierConfig {
            max_batch_size: 2,
            ..Default::default()
        };
        let service = Arc::new(IndicatorService::new(supplier.clone(), config));
        let batcher = IndicatorBatcher::spawn(service);

        let results = join_all(["a", "b", "c"].iter().map(|s| batcher.request(*s))).await;

        assert_eq!(supplier.calls.load(Ordering::SeqCst), 2);
        assert!(results.iter().all(|s| !s.is_fallback()));
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_stall_batcher() {
        let supplier = Arc::new(ScriptedSupplier::new(vec![Ok(data_for(&["BTC", "ETH"]))]));
        let service = Arc::new(IndicatorService::new(supplier, SupplierConfig::default()));
        let batcher = IndicatorBatcher::spawn(service);

        // Gives up before the collection window closes
        let abandoned =
            tokio::time::timeout(Duration::from_millis(1), batcher.request("btc")).await;
        assert!(abandoned.is_err());

        let snapshot = batcher.request("eth").await;
        assert_eq!(snapshot.symbol, "ETH");
        assert!(!snapshot.is_fallback());
    }

    #[tokio::test]
    async fn test_failure_degrades_every_request() {
        let supplier = Arc::new(ScriptedSupplier::new(vec![Err(ScoringError::DataUnavailable(
            "down".to_string(),
        ))]));
        let service = Arc::new(IndicatorService::new(supplier, SupplierConfig::default()));
        let batcher = IndicatorBatcher::spawn(service);

        let results = join_all(["btc", "eth"].iter().map(|s| batcher.request(*s))).await;
        assert!(results.iter().all(IndicatorSnapshot::is_fallback));
        assert_eq!(results[1].symbol, "ETH");
    }
}
