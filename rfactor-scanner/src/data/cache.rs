//! Snapshot cache.
//!
//! Provides in-memory caching with TTL for fetch outcomes to reduce provider
//! calls, plus a per-symbol single-flight gate so that concurrent lookups of
//! an expired entry trigger one provider call, not one per caller.

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

use super::fetcher::FetchError;
use super::SymbolSnapshot;

/// Outcome of one fetch, as stored in the cache.
pub type CachedFetch = Result<SymbolSnapshot, FetchError>;

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedFetch,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: CachedFetch, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Snapshot cache keyed by symbol
pub struct SnapshotCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Single-flight gates, one per symbol
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    ttl: Duration,
}

impl SnapshotCache {
    /// Create a cache with the given time-to-live
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Create with a TTL in seconds
    pub fn with_ttl_secs(ttl_secs: u64) -> Self {
        Self::new(Duration::from_secs(ttl_secs))
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a cached outcome if not expired
    pub fn get(&self, symbol: &str) -> Option<CachedFetch> {
        let cache = self.entries.read().ok()?;

        cache.get(symbol).and_then(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.value.clone())
            }
        })
    }

    /// Cache an outcome
    pub fn insert(&self, symbol: &str, value: CachedFetch) {
        let entry = CacheEntry::new(value, self.ttl);

        if let Ok(mut cache) = self.entries.write() {
            cache.insert(symbol.to_string(), entry);
        }
    }

    /// Return the cached outcome, or run `fetch` and cache what it returns.
    ///
    /// At most one `fetch` per symbol is in flight; callers arriving while it
    /// runs wait for it and read its result from the cache. Transport-level
    /// failures are returned but not cached.
    pub async fn get_or_fetch<F, Fut>(&self, symbol: &str, fetch: F) -> CachedFetch
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CachedFetch>,
    {
        if let Some(hit) = self.get(symbol) {
            debug!(symbol, "Snapshot cache hit");
            return hit;
        }

        let gate = self.gate(symbol);
        let value = {
            let _flight = gate.lock().await;

            // Another caller may have filled the entry while we waited
            if let Some(hit) = self.get(symbol) {
                debug!(symbol, "Snapshot cache filled by concurrent fetch");
                hit
            } else {
                let value = fetch().await;

                let transport_failure = matches!(&value, Err(e) if e.is_transport());
                if !transport_failure {
                    self.insert(symbol, value.clone());
                }
                value
            }
        };
        self.release_gate(symbol, &gate);

        value
    }

    fn gate(&self, symbol: &str) -> Arc<tokio::sync::Mutex<()>> {
        match self.gates.lock() {
            Ok(mut gates) => Arc::clone(gates.entry(symbol.to_string()).or_default()),
            // Poisoned map: fall back to an unshared gate
            Err(_) => Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Drop the gate once no other caller holds or waits on it.
    fn release_gate(&self, symbol: &str, gate: &Arc<tokio::sync::Mutex<()>>) {
        if let Ok(mut gates) = self.gates.lock() {
            let ours = gates.get(symbol).is_some_and(|g| Arc::ptr_eq(g, gate));
            // The map and this caller
            if ours && Arc::strong_count(gate) == 2 {
                gates.remove(symbol);
            }
        }
    }

    /// Invalidate the cached outcome for a symbol
    pub fn invalidate(&self, symbol: &str) {
        if let Ok(mut cache) = self.entries.write() {
            cache.remove(symbol);
        }
    }

    /// Clear all expired entries
    pub fn clear_expired(&self) {
        if let Ok(mut cache) = self.entries.write() {
            cache.retain(|_, entry| !entry.is_expired());

            if let Ok(mut gates) = self.gates.lock() {
                gates.retain(|symbol, gate| {
                    cache.contains_key(symbol) || Arc::strong_count(gate) > 1
                });
            }
        }
    }

    /// Clear all cache
    pub fn clear_all(&self) {
        if let Ok(mut cache) = self.entries.write() {
            cache.clear();
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().ok();
        let (total, expired, failures) = entries
            .map(|c| {
                let total = c.len();
                let expired = c.values().filter(|e| e.is_expired()).count();
                let failures = c
                    .values()
                    .filter(|e| !e.is_expired() && e.value.is_err())
                    .count();
                (total, expired, failures)
            })
            .unwrap_or((0, 0, 0));

        CacheStats {
            total_entries: total,
            expired_entries: expired,
            active_entries: total - expired,
            cached_failures: failures,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::with_ttl_secs(60)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
    /// Live entries that hold a data-level failure
    pub cached_failures: usize,
    pub ttl_secs: u64,
}

// ============================================================================
// Tests
// ============================================================================
