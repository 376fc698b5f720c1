use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::types::{IndicatorSnapshot, SnapshotSource};

/// Thread-safe TTL cache of indicator snapshots.
///
/// Keys are `SYMBOL:timeframe:bucket`, where the bucket is the current time
/// divided by the TTL, so a new time window never serves the previous one.
pub struct SnapshotCache {
    data: DashMap<String, CacheEntry>,
    ttl: Duration,
}

struct CacheEntry {
    snapshot: IndicatorSnapshot,
    expires_at: Instant,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            data: DashMap::new(),
            ttl,
        }
    }

    fn key(&self, symbol: &str, timeframe: &str) -> String {
        let ttl_secs = self.ttl.as_secs().max(1) as i64;
        let bucket = chrono::Utc::now().timestamp() / ttl_secs;
        format!("{}:{}:{}", symbol.to_uppercase(), timeframe, bucket)
    }

    /// Cached snapshot for the current window, marked as cached.
    pub fn get(&self, symbol: &str, timeframe: &str) -> Option<IndicatorSnapshot> {
        let key = self.key(symbol, timeframe);
        let entry = self.data.get(&key)?;
        if entry.expires_at > Instant::now() {
            let mut snapshot = entry.snapshot.clone();
            snapshot.source = SnapshotSource::Cached;
            Some(snapshot)
        } else {
            drop(entry);
            self.data.remove(&key);
            None
        }
    }

    /// Store a live snapshot under the symbol and timeframe it was requested
    /// for. Fallback snapshots are never cached.
    ///
    /// Entries from earlier windows are swept on every insert, since their
    /// keys are never read again.
    pub fn insert(&self, symbol: &str, timeframe: &str, snapshot: IndicatorSnapshot) {
        if snapshot.is_fallback() {
            return;
        }
        self.cleanup();
        let key = self.key(symbol, timeframe);
        self.data.insert(
            key,
            CacheEntry {
                snapshot,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Remove all expired entries.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.data.retain(|_, entry| entry.expires_at > now);
    }

    /// Number of entries, including expired ones not yet cleaned up.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let cache = SnapshotCache::new(Duration::from_secs(600));
        let mut snapshot = IndicatorSnapshot::new("btc", "1h");
        snapshot.rsi = Some(45.0);
        cache.insert("BTC", "1h", snapshot);

        let cached = cache.get("BTC", "1h").unwrap();
        assert_eq!(cached.rsi, Some(45.0));
        assert_eq!(cached.source, SnapshotSource::Cached);
        assert!(cache.get("BTC", "4h").is_none());
    }

    #[test]
    fn test_fallback_not_cached() {
        let cache = SnapshotCache::new(Duration::from_secs(600));
        cache.insert("ETH", "1h", IndicatorSnapshot::fallback("eth", "1h", "down"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expiry() {
        let cache = SnapshotCache::new(Duration::from_millis(10));
        cache.insert("SOL", "1h", IndicatorSnapshot::new("sol", "1h"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("SOL", "1h").is_none());
        cache.insert("SOL", "1h", IndicatorSnapshot::new("sol", "1h"));
        std::thread::sleep(Duration::from_millis(20));
        cache.cleanup();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_insert_sweeps_expired_entries() {
        let cache = SnapshotCache::new(Duration::from_millis(10));
        for symbol in ["BTC", "ETH", "SOL"] {
            cache.insert(symbol, "1h", IndicatorSnapshot::new(symbol, "1h"));
            std::thread::sleep(Duration::from_millis(20));
        }
        cache.insert("ADA", "1h", IndicatorSnapshot::new("ada", "1h"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("ADA", "1h").is_some());
    }

    #[test]
    fn test_key_uses_requested_symbol() {
        let cache = SnapshotCache::new(Duration::from_secs(600));
        let snapshot = IndicatorSnapshot::new("btcusdt", "60m");
        cache.insert("btc", "1h", snapshot);
        assert!(cache.get("BTC", "1h").is_some());
        assert!(cache.get("BTCUSDT", "60m").is_none());
    }
}
