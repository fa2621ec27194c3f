//! AI-response cache: domain keys and per-operation TTLs over any
//! [`CacheInterface`].

use super::backend::CacheInterface;
use super::key::{CacheKeyGenerator, TextTier};
use super::monitor::CachePerformanceMonitor;
use super::redis::GenericRedisCache;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AiCacheConfig {
    pub key_prefix: String,
    /// Texts with at least this many characters are hashed into the key.
    pub text_hash_threshold: usize,
    pub default_ttl: Duration,
    pub operation_ttls: HashMap<String, Duration>,
}

/// TTLs for the built-in text operations, in seconds.
pub fn default_operation_ttls() -> HashMap<String, Duration> {
    [
        ("summarize", 7_200),
        ("sentiment", 86_400),
        ("key_points", 7_200),
        ("questions", 3_600),
        ("qa", 1_800),
    ]
    .into_iter()
    .map(|(op, secs)| (op.to_string(), Duration::from_secs(secs)))
    .collect()
}

impl Default for AiCacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "ai_cache".to_string(),
            text_hash_threshold: 1000,
            default_ttl: Duration::from_secs(3600),
            operation_ttls: default_operation_ttls(),
        }
    }
}

impl AiCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text_hash_threshold(mut self, threshold: usize) -> Self {
        self.text_hash_threshold = threshold;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_operation_ttl(mut self, operation: impl Into<String>, ttl: Duration) -> Self {
        self.operation_ttls.insert(operation.into(), ttl);
        self
    }

    pub fn with_operation_ttls(mut self, ttls: HashMap<String, Duration>) -> Self {
        self.operation_ttls = ttls;
        self
    }

    pub fn validate(&self) -> Result<()> {
        const SRC: &str = "ai_cache_config";
        if self.key_prefix.is_empty() {
            return Err(Error::invalid_field(SRC, "key_prefix", "must not be empty"));
        }
        if self.text_hash_threshold == 0 {
            return Err(Error::invalid_field(SRC, "text_hash_threshold", "must be > 0"));
        }
        if self.default_ttl.is_zero() {
            return Err(Error::invalid_field(SRC, "default_ttl", "must be > 0"));
        }
        if let Some((op, _)) = self.operation_ttls.iter().find(|(_, ttl)| ttl.is_zero()) {
            return Err(Error::invalid_field(
                SRC,
                format!("operation_ttls.{}", op),
                "must be > 0",
            ));
        }
        Ok(())
    }
}

/// Stored form of a cached AI response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub response: Value,
    pub operation: String,
    pub text_tier: TextTier,
    pub cached_at: DateTime<Utc>,
}

/// Response cache for text-processing operations.
///
/// Owns only the key and TTL policy; storage is delegated to `C`, so the
/// policy can be exercised against any [`CacheInterface`].
pub struct AiResponseCache<C: CacheInterface = GenericRedisCache> {
    inner: Arc<C>,
    keys: CacheKeyGenerator,
    config: AiCacheConfig,
    monitor: Arc<CachePerformanceMonitor>,
}

impl<C: CacheInterface> AiResponseCache<C> {
    pub fn new(
        inner: Arc<C>,
        config: AiCacheConfig,
        monitor: Arc<CachePerformanceMonitor>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            keys: CacheKeyGenerator::new(config.key_prefix.clone(), config.text_hash_threshold),
            inner,
            config,
            monitor,
        })
    }

    pub fn inner(&self) -> &Arc<C> {
        &self.inner
    }

    pub fn config(&self) -> &AiCacheConfig {
        &self.config
    }

    pub fn monitor(&self) -> &Arc<CachePerformanceMonitor> {
        &self.monitor
    }

    /// Deterministic key for `(text, operation, options)`.
    pub fn build_key(&self, text: &str, operation: &str, options: &Value) -> String {
        let start = Instant::now();
        let key = self.keys.generate(text, operation, options);
        self.monitor.record_key_generation(start.elapsed());
        key
    }

    /// `operation_ttls[operation]`, or `default_ttl` for unknown operations.
    pub fn ttl_for(&self, operation: &str) -> Duration {
        self.config
            .operation_ttls
            .get(operation)
            .copied()
            .unwrap_or(self.config.default_ttl)
    }

    pub fn text_tier(&self, text: &str) -> TextTier {
        TextTier::classify(text)
    }

    pub async fn cache_response(
        &self,
        text: &str,
        operation: &str,
        options: &Value,
        response: Value,
    ) -> Result<()> {
        let key = self.build_key(text, operation, options);
        let ttl = self.ttl_for(operation);
        let entry = CachedResponse {
            response,
            operation: operation.to_string(),
            text_tier: self.text_tier(text),
            cached_at: Utc::now(),
        };
        debug!(operation, ttl_secs = ttl.as_secs(), "caching AI response");
        self.inner
            .set(&key, serde_json::to_value(&entry)?, Some(ttl))
            .await
    }

    /// A stored entry that no longer matches [`CachedResponse`] is deleted
    /// and reported as a miss.
    pub async fn get_cached_response(
        &self,
        text: &str,
        operation: &str,
        options: &Value,
    ) -> Result<Option<CachedResponse>> {
        let key = self.build_key(text, operation, options);
        let found = match self.inner.get(&key).await? {
            Some(raw) => match serde_json::from_value::<CachedResponse>(raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(operation, error = %e, "dropping malformed AI cache entry");
                    self.inner.delete(&key).await?;
                    None
                }
            },
            None => None,
        };
        self.monitor
            .record_operation_lookup(operation, found.is_some(), text.chars().count());
        Ok(found)
    }

    pub async fn invalidate_response(
        &self,
        text: &str,
        operation: &str,
        options: &Value,
    ) -> Result<()> {
        let key = self.build_key(text, operation, options);
        self.inner.delete(&key).await?;
        self.monitor.record_invalidation(&key, 1, "explicit");
        Ok(())
    }

    /// Hit rate per AI operation observed so far.
    pub fn operation_metrics(&self) -> BTreeMap<String, f64> {
        self.monitor.operation_hit_rates()
    }
}

impl AiResponseCache<GenericRedisCache> {
    pub async fn connect(&self) -> bool {
        self.inner.connect().await
    }

    /// Drop every cached response for one operation.
    pub async fn invalidate_operation(&self, operation: &str) -> usize {
        let pattern = self.keys.operation_pattern(operation);
        self.inner
            .invalidate_pattern(&pattern, &format!("operation:{}", operation))
            .await
    }

    pub async fn invalidate_all(&self) -> usize {
        let pattern = self.keys.namespace_pattern();
        self.inner.invalidate_pattern(&pattern, "invalidate_all").await
    }
}

#[async_trait]
impl<C: CacheInterface> CacheInterface for AiResponseCache<C> {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        self.inner
            .set(key, value, Some(ttl.unwrap_or(self.config.default_ttl)))
            .await
    }
    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }
    fn name(&self) -> &'static str {
        "ai_response"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryCache;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records the TTL of every write.
    struct RecordingCache {
        inner: InMemoryCache,
        ttls: Mutex<Vec<(String, Option<Duration>)>>,
    }

    impl RecordingCache {
        fn new() -> Self {
            Self {
                inner: InMemoryCache::new(100, Duration::from_secs(60)),
                ttls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CacheInterface for RecordingCache {
        async fn get(&self, key: &str) -> Result<Option<Value>> {
            Ok(self.inner.get(key))
        }
        async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
            self.ttls.lock().unwrap().push((key.to_string(), ttl));
            self.inner.set(key, value, ttl);
            Ok(())
        }
        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key);
            Ok(())
        }
        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn ai_cache() -> AiResponseCache<RecordingCache> {
        let config = AiCacheConfig::new()
            .with_operation_ttls(HashMap::new())
            .with_operation_ttl("summarize", Duration::from_secs(7200))
            .with_default_ttl(Duration::from_secs(3600));
        AiResponseCache::new(
            Arc::new(RecordingCache::new()),
            config,
            Arc::new(CachePerformanceMonitor::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ttl_selection_per_operation() {
        let cache = ai_cache();
        cache
            .cache_response("doc", "summarize", &Value::Null, json!("s"))
            .await
            .unwrap();
        cache
            .cache_response("doc", "unknown_op", &Value::Null, json!("u"))
            .await
            .unwrap();
        let ttls = cache.inner().ttls.lock().unwrap().clone();
        assert_eq!(ttls[0].1, Some(Duration::from_secs(7200)));
        assert_eq!(ttls[1].1, Some(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn test_round_trip_and_operation_metrics() {
        let cache = ai_cache();
        let opts = json!({"max_length": 50});
        assert!(cache
            .get_cached_response("text", "summarize", &opts)
            .await
            .unwrap()
            .is_none());
        cache
            .cache_response("text", "summarize", &opts, json!({"summary": "short"}))
            .await
            .unwrap();
        let hit = cache
            .get_cached_response("text", "summarize", &opts)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.response, json!({"summary": "short"}));
        assert_eq!(hit.operation, "summarize");
        assert_eq!(hit.text_tier, TextTier::Small);
        assert!((cache.operation_metrics()["summarize"] - 0.5).abs() < 1e-9);
        assert_eq!(cache.monitor().stats().key_generation_ms.count, 3);
    }

    #[tokio::test]
    async fn test_different_options_miss() {
        let cache = ai_cache();
        cache
            .cache_response("text", "qa", &json!({"question": "who?"}), json!("a"))
            .await
            .unwrap();
        assert!(cache
            .get_cached_response("text", "qa", &json!({"question": "why?"}))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_malformed_entry_is_a_miss() {
        let cache = ai_cache();
        let key = cache.build_key("t", "summarize", &Value::Null);
        cache.inner().set(&key, json!("not an envelope"), None).await.unwrap();
        assert!(cache
            .get_cached_response("t", "summarize", &Value::Null)
            .await
            .unwrap()
            .is_none());
        assert_eq!(cache.inner().get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalidate_response() {
        let cache = ai_cache();
        cache
            .cache_response("t", "sentiment", &Value::Null, json!("positive"))
            .await
            .unwrap();
        cache
            .invalidate_response("t", "sentiment", &Value::Null)
            .await
            .unwrap();
        assert!(cache
            .get_cached_response("t", "sentiment", &Value::Null)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_config_rejects_zero_operation_ttl() {
        let cfg = AiCacheConfig::new().with_operation_ttl("summarize", Duration::ZERO);
        let err = cfg.validate().unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("operation_ttls.summarize")
        );
    }
}
