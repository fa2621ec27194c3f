//! Single-process LRU cache with per-entry TTL.
//!
//! Used standalone or as the L1 tier of [`super::GenericRedisCache`].
//! All operations are synchronous and never suspend; the async
//! [`CacheInterface`] impl simply wraps them.

use super::backend::CacheInterface;
use crate::Result;
use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    ttl: Duration,
    expires_at: Instant,
    size_bytes: usize,
}

impl CacheEntry {
    fn new(value: Value, ttl: Duration) -> Self {
        let size_bytes = estimate_size(&value);
        Self {
            value,
            ttl,
            expires_at: Instant::now() + ttl,
            size_bytes,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

fn estimate_size(value: &Value) -> usize {
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
}

/// Point-in-time counters for an [`InMemoryCache`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub size: usize,
    pub max_size: usize,
    pub memory_bytes: usize,
}

impl MemoryCacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.size as f64 / self.max_size as f64
        }
    }
}

enum Lookup {
    Hit(Value),
    Expired,
    Miss,
}

struct State {
    entries: LruCache<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    memory_bytes: usize,
}

impl State {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.pop(key);
        if let Some(ref e) = removed {
            self.memory_bytes = self.memory_bytes.saturating_sub(e.size_bytes);
        }
        removed
    }
}

/// Bounded LRU cache with TTL.
///
/// - `len() <= max_size` after every `set`; the least recently used entry is
///   evicted to make room (entries never read are ordered by insertion).
/// - Expired entries are dropped lazily on read and by [`cleanup_expired`].
/// - A TTL of zero means "expires immediately": the write removes any
///   existing entry for the key and stores nothing.
///
/// [`cleanup_expired`]: InMemoryCache::cleanup_expired
pub struct InMemoryCache {
    state: Mutex<State>,
    max_size: usize,
    default_ttl: Duration,
    sliding_expiration: bool,
}

impl InMemoryCache {
    /// `max_size` of zero is clamped to one entry.
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(max_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(State {
                entries: LruCache::new(cap),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
                memory_bytes: 0,
            }),
            max_size: cap.get(),
            default_ttl,
            sliding_expiration: false,
        }
    }

    /// Reset an entry's TTL every time it is read.
    pub fn with_sliding_expiration(mut self, enabled: bool) -> Self {
        self.sliding_expiration = enabled;
        self
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`, bumping its recency on a hit.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut st = self.lock();
        let lookup = match st.entries.get_mut(key) {
            None => Lookup::Miss,
            Some(entry) if entry.is_expired(now) => Lookup::Expired,
            Some(entry) => {
                if self.sliding_expiration {
                    entry.expires_at = now + entry.ttl;
                }
                Lookup::Hit(entry.value.clone())
            }
        };
        match lookup {
            Lookup::Hit(value) => {
                st.hits += 1;
                Some(value)
            }
            Lookup::Expired => {
                st.remove(key);
                st.expirations += 1;
                st.misses += 1;
                None
            }
            Lookup::Miss => {
                st.misses += 1;
                None
            }
        }
    }

    /// Store `value`, overwriting any existing entry.
    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut st = self.lock();
        if ttl.is_zero() {
            st.remove(key);
            return;
        }
        let entry = CacheEntry::new(value, ttl);
        st.memory_bytes += entry.size_bytes;
        if let Some((old_key, old)) = st.entries.push(key.to_string(), entry) {
            st.memory_bytes = st.memory_bytes.saturating_sub(old.size_bytes);
            if old_key != key {
                st.evictions += 1;
                tracing::debug!(evicted = %old_key, "memory cache evicted LRU entry");
            }
        }
    }

    /// Remove `key` if present. Returns whether something was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Presence check that neither bumps recency nor counts as a hit.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.lock()
            .entries
            .peek(key)
            .map(|e| !e.is_expired(now))
            .unwrap_or(false)
    }

    /// Remaining lifetime of a live entry.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.lock()
            .entries
            .peek(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.expires_at.saturating_duration_since(now))
    }

    /// Live keys, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.lock()
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut st = self.lock();
        let expired: Vec<String> = st
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            st.remove(key);
        }
        st.expirations += expired.len() as u64;
        expired.len()
    }

    pub fn clear(&self) {
        let mut st = self.lock();
        st.entries.clear();
        st.memory_bytes = 0;
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> MemoryCacheStats {
        let st = self.lock();
        MemoryCacheStats {
            hits: st.hits,
            misses: st.misses,
            evictions: st.evictions,
            expirations: st.expirations,
            size: st.entries.len(),
            max_size: self.max_size,
            memory_bytes: st.memory_bytes,
        }
    }

    pub fn reset_stats(&self) {
        let mut st = self.lock();
        st.hits = 0;
        st.misses = 0;
        st.evictions = 0;
        st.expirations = 0;
    }
}

#[async_trait]
impl CacheInterface for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(InMemoryCache::get(self, key))
    }
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        InMemoryCache::set(self, key, value, ttl);
        Ok(())
    }
    async fn delete(&self, key: &str) -> Result<()> {
        InMemoryCache::delete(self, key);
        Ok(())
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}
