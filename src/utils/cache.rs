//! In-Memory TTL Cache Module
//!
//! Thread-safe caching layer for replay analyses and fallback results.
//! DashMap gives concurrent access without lock contention; entries carry
//! a per-entry TTL and are derived from immutable historical chain data,
//! so no cross-key consistency is needed.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::utils::constants::DEFAULT_CACHE_TTL_SECS;

/// Cache entry with creation timestamp for TTL validation
#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl_secs: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > Duration::from_secs(self.ttl_secs)
    }

    fn remaining_ttl(&self) -> u64 {
        self.ttl_secs.saturating_sub(self.created_at.elapsed().as_secs())
    }
}

/// Generic process-wide TTL cache. Cloning shares the underlying store, so
/// one instance can be handed to every in-flight analysis.
#[derive(Clone)]
pub struct TtlCache<V: Clone> {
    store: Arc<DashMap<String, CacheEntry<V>>>,
    ttl_secs: u64,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache with the default TTL (5 minutes)
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL_SECS)
    }

    /// Create a cache with a custom TTL
    pub fn with_ttl(ttl_secs: u64) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            ttl_secs,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get with TTL validation. Expired entries are evicted on read.
    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.store.get(key) {
            if entry.is_expired() {
                drop(entry); // release read lock before removal
                self.store.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 CACHE MISS (expired): {}", key);
                None
            } else {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("✅ CACHE HIT: {} (TTL: {}s remaining)", key, entry.remaining_ttl());
                Some(entry.value.clone())
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("📭 CACHE MISS: {}", key);
            None
        }
    }

    /// Store with the cache's default TTL
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        self.store.insert(
            key.clone(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl_secs: self.ttl_secs,
            },
        );
        debug!("💾 CACHE SET: {} (TTL: {}s)", key, self.ttl_secs);
    }

    /// Remove one entry
    pub fn invalidate(&self, key: &str) {
        self.store.remove(key);
    }

    /// Sweep expired entries, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        // Concurrent inserts during retain can make len() grow past `before`
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            info!("🧹 CACHE CLEANUP: {} expired entries removed", removed);
        }
        removed
    }

    /// Cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            entries: self.store.len(),
            hits,
            misses,
            hit_rate,
            ttl_secs: self.ttl_secs,
        }
    }

    /// Drop everything
    pub fn clear(&self) {
        self.store.clear();
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}
