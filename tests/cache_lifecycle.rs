//! Lifecycle tests for the standalone memory cache and the cache factory.

use ai_response_cache::cache::{
    build_cache, CacheConfig, CacheInterface, CachePerformanceMonitor, CachePreset, InMemoryCache,
    NullCache,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_basic_lifecycle_evicts_least_recent() {
    let cache = InMemoryCache::new(2, Duration::from_secs(60));
    cache.set("a", json!(1), None);
    cache.set("b", json!(2), None);
    cache.set("c", json!(3), None);

    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.get("b"), Some(json!(2)));
    assert_eq!(cache.get("c"), Some(json!(3)));
    assert!(cache.len() <= 2);
}

#[test]
fn test_get_protects_key_from_eviction() {
    let cache = InMemoryCache::new(3, Duration::from_secs(60));
    for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
        cache.set(k, json!(v), None);
    }
    assert_eq!(cache.get("a"), Some(json!(1)));
    cache.set("d", json!(4), None);

    assert!(cache.contains("a"));
    assert!(!cache.contains("b"));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_overwrite_keeps_single_entry() {
    let cache = InMemoryCache::new(2, Duration::from_secs(60));
    cache.set("a", json!("old"), None);
    cache.set("a", json!("new"), None);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("a"), Some(json!("new")));
}

#[test]
fn test_delete_is_idempotent() {
    let cache = InMemoryCache::new(10, Duration::from_secs(60));
    cache.set("a", json!(1), None);
    assert!(cache.delete("a"));
    assert!(!cache.delete("a"));
    assert_eq!(cache.get("a"), None);
}

#[test]
fn test_zero_ttl_expires_immediately() {
    let cache = InMemoryCache::new(10, Duration::from_secs(60));
    cache.set("a", json!(1), None);
    cache.set("a", json!(2), Some(Duration::ZERO));
    assert_eq!(cache.get("a"), None);
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ttl_expiry() {
    let cache = InMemoryCache::new(10, Duration::from_secs(60));
    cache.set("short", json!("v"), Some(Duration::from_secs(1)));
    cache.set("long", json!("v"), None);
    assert_eq!(cache.get("short"), Some(json!("v")));

    tokio::time::advance(Duration::from_millis(1_001)).await;
    assert_eq!(cache.get("short"), None);
    assert_eq!(cache.get("long"), Some(json!("v")));
    assert_eq!(cache.stats().expirations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_sweeps_expired_entries() {
    let cache = InMemoryCache::new(10, Duration::from_secs(5));
    for i in 0..4 {
        cache.set(&format!("k{}", i), json!(i), None);
    }
    cache.set("keep", json!("v"), Some(Duration::from_secs(60)));
    tokio::time::advance(Duration::from_secs(6)).await;

    assert_eq!(cache.cleanup_expired(), 4);
    assert_eq!(cache.keys(), vec!["keep".to_string()]);
}

#[test]
fn test_stats_track_hits_and_misses() {
    let cache = InMemoryCache::new(10, Duration::from_secs(60));
    cache.set("a", json!(1), None);
    cache.get("a");
    cache.get("a");
    cache.get("missing");

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_ratio() - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.size, 1);
}

#[tokio::test]
async fn test_caches_are_interchangeable_through_the_trait() {
    let caches: Vec<Arc<dyn CacheInterface>> = vec![
        Arc::new(InMemoryCache::new(10, Duration::from_secs(60))),
        Arc::new(NullCache::new()),
    ];
    for cache in caches {
        cache.set("k", json!({"v": 1}), None).await.unwrap();
        let read = cache.get("k").await.unwrap();
        match cache.name() {
            "memory" => assert_eq!(read, Some(json!({"v": 1}))),
            _ => assert_eq!(read, None),
        }
        cache.delete("k").await.unwrap();
        cache.delete("k").await.unwrap();
    }
}

#[tokio::test]
async fn test_factory_builds_each_preset_without_redis() {
    let monitor = Arc::new(CachePerformanceMonitor::new());
    for preset in CachePreset::ALL {
        // nothing listens here, so Redis-backed presets start degraded
        let mut config = CacheConfig::from_preset(preset).with_redis_url("redis://127.0.0.1:1");
        config.connect_timeout_ms = 300;
        let cache = build_cache(&config, monitor.clone()).await.unwrap();
        cache.set("k", json!("v"), None).await.unwrap();
        let expected = match preset {
            CachePreset::Disabled => None,
            _ => Some(json!("v")),
        };
        assert_eq!(cache.get("k").await.unwrap(), expected, "preset {}", preset);
    }
}

#[test]
fn test_preset_names_round_trip() {
    for preset in CachePreset::ALL {
        assert_eq!(preset.to_string().parse::<CachePreset>().unwrap(), preset);
    }
}
