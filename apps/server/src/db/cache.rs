//! Short-lived result cache for listing queries
//!
//! Entries are keyed by the full query identity and live for a caller-supplied TTL. Failed
//! computations are never stored. When the cache grows past its sweep threshold, entries older
//! than twice the TTL are evicted after the write that pushed it over.

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::models::Resource;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SWEEP_THRESHOLD: usize = 100;

/// A cached value and the wall-clock time (ms) it was computed.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub data: V,
    pub timestamp_millis: i64,
}

/// Time-boxed memoization of pool-executed operations
#[derive(Debug)]
pub struct QueryCache<V> {
    /// Never locked across an await point.
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
    sweep_threshold: usize,
    enabled: bool,
}

impl<V: Clone> QueryCache<V> {
    /// Create an enabled cache reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
            enabled: true,
        }
    }

    /// Create a cache from configuration, using the system clock
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Arc::new(SystemClock))
            .with_sweep_threshold(config.sweep_threshold)
            .with_enabled(config.enabled)
    }

    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold;
        self
    }

    /// A disabled cache runs `compute` on every call and stores nothing
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Return the cached value for `key` if younger than `ttl`, otherwise compute and store it
    pub async fn get<F, Fut, E>(&self, key: &str, compute: F, ttl: Duration) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_entry(key, compute, ttl)
            .await
            .map(|entry| entry.data)
    }

    /// Like [`QueryCache::get`] but returns the entry with its timestamp
    pub async fn get_entry<F, Fut, E>(
        &self,
        key: &str,
        compute: F,
        ttl: Duration,
    ) -> Result<CacheEntry<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        if self.enabled {
            let now = self.clock.now_millis();
            let entries = self.entries.lock();
            if let Some(entry) = entries.get(key) {
                if now - entry.timestamp_millis < ttl_millis {
                    tracing::debug!(key, "Query cache hit");
                    return Ok(entry.clone());
                }
            }
        }

        tracing::debug!(key, "Query cache miss");
        let data = compute().await?;
        let entry = CacheEntry {
            data,
            timestamp_millis: self.clock.now_millis(),
        };

        if self.enabled {
            let mut entries = self.entries.lock();
            entries.insert(key.to_string(), entry.clone());
            if entries.len() > self.sweep_threshold {
                let cutoff = entry.timestamp_millis - ttl_millis.saturating_mul(2);
                let before = entries.len();
                entries.retain(|_, e| e.timestamp_millis >= cutoff);
                tracing::debug!(
                    evicted = before - entries.len(),
                    remaining = entries.len(),
                    "Swept stale query cache entries"
                );
            }
        }

        Ok(entry)
    }

    /// Remove one entry
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Remove every entry belonging to `resource`
    pub fn invalidate_resource(&self, resource: Resource) -> usize {
        let prefix = format!("{}:", resource.as_str());
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        before - entries.len()
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
