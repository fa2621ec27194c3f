//! Two-tier cache: an in-process LRU (L1) in front of Redis (L2).
//!
//! Reads check L1, then L2, promoting L2 hits into L1. Writes go to L2
//! first and then L1, so a write cancelled mid-flight never leaves L1 ahead
//! of L2. A promotion is dropped if the key was written or deleted while
//! the L2 read was in flight.
//!
//! Redis failures move the cache into [`ConnectionState::Degraded`] where it
//! serves from memory only. Once the cooldown has passed a single caller
//! attempts the reconnect while the rest keep using L1. On recovery L1 is
//! cleared because it may hold writes that never reached L2.

use super::backend::CacheInterface;
use super::compression::PayloadCodec;
use super::memory::{InMemoryCache, MemoryCacheStats};
use super::monitor::{CachePerformanceMonitor, LookupOutcome, PerformanceStats};
use super::remote::{RedisStore, RemoteStore};
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    pub redis_url: String,
    pub default_ttl: Duration,
    pub enable_l1_cache: bool,
    pub memory_cache_size: usize,
    /// Serialized size (bytes) at or above which L2 payloads are compressed.
    pub compression_threshold: usize,
    pub compression_level: u32,
    pub key_prefix: Option<String>,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    /// Minimum wait between reconnect attempts while degraded.
    pub reconnect_cooldown: Duration,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            default_ttl: Duration::from_secs(3600),
            enable_l1_cache: true,
            memory_cache_size: 100,
            compression_threshold: 1000,
            compression_level: 6,
            key_prefix: None,
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(2),
            reconnect_cooldown: Duration::from_secs(30),
        }
    }
}

impl RedisCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_l1_cache(mut self, enabled: bool) -> Self {
        self.enable_l1_cache = enabled;
        self
    }

    pub fn with_memory_cache_size(mut self, size: usize) -> Self {
        self.memory_cache_size = size;
        self
    }

    pub fn with_compression(mut self, threshold: usize, level: u32) -> Self {
        self.compression_threshold = threshold;
        self.compression_level = level;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, operation: Duration) -> Self {
        self.connect_timeout = connect;
        self.operation_timeout = operation;
        self
    }

    pub fn with_reconnect_cooldown(mut self, cooldown: Duration) -> Self {
        self.reconnect_cooldown = cooldown;
        self
    }

    pub fn validate(&self) -> Result<()> {
        const SRC: &str = "redis_cache_config";
        if !["redis://", "rediss://", "unix://"]
            .iter()
            .any(|s| self.redis_url.starts_with(s))
        {
            return Err(Error::invalid_field(
                SRC,
                "redis_url",
                format!("unsupported scheme in '{}'", self.redis_url),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(Error::invalid_field(SRC, "default_ttl", "must be > 0"));
        }
        if self.enable_l1_cache && self.memory_cache_size == 0 {
            return Err(Error::invalid_field(
                SRC,
                "memory_cache_size",
                "must be > 0 when the memory tier is enabled",
            ));
        }
        if !(1..=9).contains(&self.compression_level) {
            return Err(Error::invalid_field(SRC, "compression_level", "must be in 1..=9"));
        }
        if self.operation_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(Error::invalid_field(SRC, "timeouts", "must be > 0"));
        }
        Ok(())
    }
}

/// Availability of the remote tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// `connect()` has not succeeded yet, or `disconnect()` was called.
    Disconnected,
    Connected,
    /// Redis failed; serving from memory only until a reconnect succeeds.
    Degraded,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub state: ConnectionState,
    pub remote_reachable: bool,
    pub memory_entries: usize,
    pub last_error: Option<String>,
}

impl CacheHealth {
    /// Memory-only operation still counts as healthy for a cache.
    pub fn is_serving(&self) -> bool {
        true
    }

    pub fn is_fully_operational(&self) -> bool {
        self.state == ConnectionState::Connected && self.remote_reachable
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub backend: String,
    pub connection_state: ConnectionState,
    pub memory: Option<MemoryCacheStats>,
    pub performance: PerformanceStats,
}

struct Link {
    state: ConnectionState,
    degraded_at: Option<Instant>,
}

enum Route {
    Remote,
    MemoryOnly,
    Reconnect,
}

enum L2<T> {
    Skipped,
    Failed,
    Done(T),
}

/// Translate a Redis glob (`*`, `?`, `\` escapes) into an anchored regex.
pub(crate) fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '\\' => {
                if let Some(lit) = chars.next() {
                    re.push_str(&regex::escape(&lit.to_string()));
                }
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

const WRITE_GEN_STRIPES: usize = 64;

fn stripe(key: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % WRITE_GEN_STRIPES as u64) as usize
}

pub struct GenericRedisCache {
    config: RedisCacheConfig,
    codec: PayloadCodec,
    l1: Option<InMemoryCache>,
    store: RwLock<Option<Arc<dyn RemoteStore>>>,
    injected: Option<Arc<dyn RemoteStore>>,
    link: Mutex<Link>,
    connect_lock: tokio::sync::Mutex<()>,
    /// Per-stripe counters bumped by every L1 write or delete. A read only
    /// promotes an L2 value if its stripe did not move during the L2 call.
    write_gens: Mutex<Vec<u64>>,
    monitor: Arc<CachePerformanceMonitor>,
}

impl GenericRedisCache {
    /// Cache that connects to `config.redis_url` on [`connect`](Self::connect).
    pub fn new(config: RedisCacheConfig, monitor: Arc<CachePerformanceMonitor>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, monitor, None))
    }

    /// Cache over a caller-supplied remote store instead of a Redis URL.
    pub fn with_store(
        config: RedisCacheConfig,
        monitor: Arc<CachePerformanceMonitor>,
        store: Arc<dyn RemoteStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, monitor, Some(store)))
    }

    fn build(
        config: RedisCacheConfig,
        monitor: Arc<CachePerformanceMonitor>,
        injected: Option<Arc<dyn RemoteStore>>,
    ) -> Self {
        let l1 = config
            .enable_l1_cache
            .then(|| InMemoryCache::new(config.memory_cache_size, config.default_ttl));
        Self {
            codec: PayloadCodec::new(config.compression_threshold, config.compression_level),
            config,
            l1,
            store: RwLock::new(None),
            injected,
            link: Mutex::new(Link {
                state: ConnectionState::Disconnected,
                degraded_at: None,
            }),
            connect_lock: tokio::sync::Mutex::new(()),
            write_gens: Mutex::new(vec![0; WRITE_GEN_STRIPES]),
            monitor,
        }
    }

    pub fn config(&self) -> &RedisCacheConfig {
        &self.config
    }

    pub fn monitor(&self) -> &Arc<CachePerformanceMonitor> {
        &self.monitor
    }

    pub fn codec(&self) -> &PayloadCodec {
        &self.codec
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.link().state
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_store(&self) -> Option<Arc<dyn RemoteStore>> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_store(&self, store: Option<Arc<dyn RemoteStore>>) {
        *self.store.write().unwrap_or_else(PoisonError::into_inner) = store;
    }

    fn write_gens(&self) -> MutexGuard<'_, Vec<u64>> {
        self.write_gens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_generation(&self, key: &str) -> u64 {
        self.write_gens()[stripe(key)]
    }

    /// Run an L1 mutation of `key`, cancelling any promotion of it in flight.
    fn write_local(&self, key: &str, f: impl FnOnce(&InMemoryCache)) {
        let Some(l1) = &self.l1 else {
            return;
        };
        let mut gens = self.write_gens();
        let i = stripe(key);
        gens[i] = gens[i].wrapping_add(1);
        f(l1);
    }

    fn promote(&self, key: &str, generation: u64, value: Value, ttl: Duration) {
        let Some(l1) = &self.l1 else {
            return;
        };
        let gens = self.write_gens();
        if gens[stripe(key)] == generation {
            l1.set(key, value, Some(ttl));
        } else {
            debug!(key, "key written during remote read; not promoting");
        }
    }

    /// Delete L1 keys matching `re` and cancel every promotion in flight.
    fn invalidate_local(&self, re: &Regex) -> usize {
        let Some(l1) = &self.l1 else {
            return 0;
        };
        let mut gens = self.write_gens();
        for g in gens.iter_mut() {
            *g = g.wrapping_add(1);
        }
        l1.keys()
            .into_iter()
            .filter(|k| re.is_match(k))
            .filter(|k| l1.delete(k))
            .count()
    }

    fn prefixed(&self, key: &str) -> String {
        match self.config.key_prefix {
            Some(ref p) => format!("{}{}", p, key),
            None => key.to_string(),
        }
    }

    /// Establish the remote connection.
    ///
    /// Idempotent. Never fails: returns `false` and enters
    /// [`ConnectionState::Degraded`] when Redis cannot be reached.
    pub async fn connect(&self) -> bool {
        let _guard = self.connect_lock.lock().await;
        self.establish().await
    }

    /// Connect and ping. The caller holds `connect_lock`.
    async fn establish(&self) -> bool {
        let previous = self.connection_state();
        if previous == ConnectionState::Connected {
            return true;
        }

        let store: Arc<dyn RemoteStore> = match self.injected.clone() {
            Some(s) => s,
            None => match timeout(self.config.connect_timeout, RedisStore::connect(&self.config.redis_url)).await {
                Ok(Ok(s)) => Arc::new(s),
                Ok(Err(e)) => {
                    self.mark_unreachable(&e.to_string());
                    return false;
                }
                Err(_) => {
                    self.mark_unreachable("connect timed out");
                    return false;
                }
            },
        };

        match timeout(self.config.operation_timeout, store.ping()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.mark_unreachable(&e.to_string());
                return false;
            }
            Err(_) => {
                self.mark_unreachable("ping timed out");
                return false;
            }
        }

        self.set_store(Some(store));
        {
            let mut link = self.link();
            link.state = ConnectionState::Connected;
            link.degraded_at = None;
        }
        if previous == ConnectionState::Degraded {
            if let Some(l1) = &self.l1 {
                l1.clear();
            }
            self.monitor.record_recovery();
            info!(backend = self.name(), "remote cache tier recovered; memory tier reset");
        } else {
            info!(backend = self.name(), "connected to remote cache tier");
        }
        true
    }

    pub async fn disconnect(&self) {
        let _guard = self.connect_lock.lock().await;
        self.set_store(None);
        let mut link = self.link();
        link.state = ConnectionState::Disconnected;
        link.degraded_at = None;
    }

    fn mark_unreachable(&self, reason: &str) {
        self.set_store(None);
        let mut link = self.link();
        let was = link.state;
        link.state = ConnectionState::Degraded;
        link.degraded_at = Some(Instant::now());
        drop(link);
        if was == ConnectionState::Degraded {
            debug!(reason, "remote cache tier still unreachable");
        } else {
            self.monitor.record_degradation(reason);
            warn!(reason, "remote cache tier unavailable; using memory tier only");
        }
    }

    fn route(&self) -> Route {
        let link = self.link();
        match link.state {
            ConnectionState::Connected => Route::Remote,
            ConnectionState::Disconnected => Route::MemoryOnly,
            ConnectionState::Degraded => match link.degraded_at {
                Some(t) if t.elapsed() < self.config.reconnect_cooldown => Route::MemoryOnly,
                _ => Route::Reconnect,
            },
        }
    }

    async fn remote(&self) -> Option<Arc<dyn RemoteStore>> {
        match self.route() {
            Route::Remote => return self.current_store(),
            Route::MemoryOnly => return None,
            Route::Reconnect => {}
        }
        // At most one reconnect attempt in flight; other callers stay on L1.
        let Ok(_guard) = self.connect_lock.try_lock() else {
            return None;
        };
        // Re-check: the previous holder may have just succeeded or failed.
        match self.route() {
            Route::Remote => self.current_store(),
            Route::MemoryOnly => None,
            Route::Reconnect => {
                if self.establish().await {
                    self.current_store()
                } else {
                    None
                }
            }
        }
    }

    async fn l2_call<T, F, Fut>(&self, op: &'static str, f: F) -> L2<T>
    where
        F: FnOnce(Arc<dyn RemoteStore>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(store) = self.remote().await else {
            return L2::Skipped;
        };
        match timeout(self.config.operation_timeout, f(store)).await {
            Ok(Ok(v)) => L2::Done(v),
            Ok(Err(e)) => {
                self.on_remote_failure(op, &e.to_string());
                L2::Failed
            }
            Err(_) => {
                self.on_remote_failure(op, "operation timed out");
                L2::Failed
            }
        }
    }

    fn on_remote_failure(&self, op: &str, message: &str) {
        self.monitor.record_backend_error(op, message);
        self.mark_unreachable(&format!("{} failed: {}", op, message));
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let start = Instant::now();
        if let Some(l1) = &self.l1 {
            if let Some(v) = l1.get(key) {
                self.monitor.record_get(start.elapsed(), LookupOutcome::L1Hit);
                return Some(v);
            }
        }

        let generation = self.write_generation(key);
        let pk = self.prefixed(key);
        let lookup_key = pk.clone();
        let found = match self
            .l2_call("get", |s| async move { s.get(&lookup_key).await })
            .await
        {
            L2::Done(Some(entry)) => match self.codec.decode(&entry.payload) {
                Ok(value) => {
                    let ttl = entry.ttl.unwrap_or(self.config.default_ttl);
                    self.promote(key, generation, value.clone(), ttl);
                    Some(value)
                }
                Err(e) => {
                    warn!(key, error = %e, "discarding undecodable cache entry");
                    self.monitor.record_backend_error("decode", &e.to_string());
                    let _ = self
                        .l2_call("delete", |s| async move { s.delete(&pk).await })
                        .await;
                    None
                }
            },
            _ => None,
        };

        let outcome = if found.is_some() {
            LookupOutcome::L2Hit
        } else {
            LookupOutcome::Miss
        };
        self.monitor.record_get(start.elapsed(), outcome);
        found
    }

    /// A zero TTL deletes the key from both tiers.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        if ttl.is_zero() {
            self.delete(key).await;
            return;
        }
        let start = Instant::now();
        let encoded = match self.codec.encode(&value) {
            Ok(e) => e,
            Err(e) => {
                warn!(key, error = %e, "failed to encode cache value");
                self.monitor.record_backend_error("encode", &e.to_string());
                return;
            }
        };
        if encoded.compressed {
            self.monitor
                .record_compression(encoded.original_size, encoded.bytes.len(), start.elapsed());
        }

        let pk = self.prefixed(key);
        let payload = encoded.bytes;
        let _ = self
            .l2_call("set", |s| async move { s.set(&pk, &payload, ttl).await })
            .await;
        self.write_local(key, |l1| l1.set(key, value, Some(ttl)));
        self.monitor.record_set(start.elapsed());
    }

    /// Returns `false` if the remote delete failed (memory tier is still cleared).
    pub async fn delete(&self, key: &str) -> bool {
        self.write_local(key, |l1| {
            l1.delete(key);
        });
        let pk = self.prefixed(key);
        let outcome = self
            .l2_call("delete", |s| async move { s.delete(&pk).await })
            .await;
        // a read that overlapped the remote delete may have promoted since
        self.write_local(key, |l1| {
            l1.delete(key);
        });
        self.monitor.record_delete();
        !matches!(outcome, L2::Failed)
    }

    pub async fn exists(&self, key: &str) -> bool {
        if self.l1.as_ref().map(|l1| l1.contains(key)).unwrap_or(false) {
            return true;
        }
        let pk = self.prefixed(key);
        matches!(
            self.l2_call("exists", |s| async move { s.exists(&pk).await }).await,
            L2::Done(true)
        )
    }

    /// Remove every key matching a Redis glob pattern from both tiers.
    ///
    /// The pattern is matched against unprefixed keys. Returns the number of
    /// keys removed from L2, or from L1 when L2 is unavailable.
    pub async fn invalidate_pattern(&self, pattern: &str, reason: &str) -> usize {
        let matcher = glob_to_regex(pattern);
        let l1_removed = matcher.as_ref().map(|re| self.invalidate_local(re)).unwrap_or(0);

        let remote_pattern = self.prefixed(pattern);
        let removed = match self
            .l2_call("invalidate", |s| async move {
                let keys = s.keys(&remote_pattern).await?;
                s.delete_many(&keys).await
            })
            .await
        {
            L2::Done(n) => n,
            _ => l1_removed,
        };
        if let Some(re) = &matcher {
            self.invalidate_local(re);
        }
        self.monitor.record_invalidation(pattern, removed, reason);
        info!(pattern, removed, reason, "invalidated cache entries");
        removed
    }

    pub async fn clear(&self) -> usize {
        self.invalidate_pattern("*", "clear").await
    }

    /// Drop only the memory tier, e.g. to simulate a process restart.
    pub fn clear_memory_tier(&self) {
        if let Some(l1) = &self.l1 {
            l1.clear();
        }
    }

    pub fn memory_stats(&self) -> Option<MemoryCacheStats> {
        self.l1.as_ref().map(|l1| l1.stats())
    }

    pub async fn health_check(&self) -> CacheHealth {
        let remote_reachable = match self.current_store() {
            Some(store) => matches!(
                timeout(self.config.operation_timeout, store.ping()).await,
                Ok(Ok(()))
            ),
            None => false,
        };
        CacheHealth {
            state: self.connection_state(),
            remote_reachable,
            memory_entries: self.l1.as_ref().map(|l1| l1.len()).unwrap_or(0),
            last_error: self.monitor.last_error(),
        }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            backend: self.name().to_string(),
            connection_state: self.connection_state(),
            memory: self.memory_stats(),
            performance: self.monitor.stats(),
        }
    }
}

#[async_trait]
impl CacheInterface for GenericRedisCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(GenericRedisCache::get(self, key).await)
    }
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        GenericRedisCache::set(self, key, value, ttl).await;
        Ok(())
    }
    async fn delete(&self, key: &str) -> Result<()> {
        GenericRedisCache::delete(self, key).await;
        Ok(())
    }
    fn name(&self) -> &'static str {
        "redis"
    }
}
