//! # Response Caching Module
//!
//! Caching for expensive AI text-processing results, with a process-local
//! LRU tier in front of a shared Redis tier.
//!
//! ## Overview
//!
//! Every implementation satisfies [`CacheInterface`], so callers can swap a
//! no-op cache for a memory cache or the full two-tier cache without code
//! changes. Cache failures never fail the caller: an unreachable Redis
//! degrades the two-tier cache to memory-only operation.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheInterface`] | Async get/set/delete contract shared by all caches |
//! | [`InMemoryCache`] | Bounded LRU cache with per-entry TTL |
//! | [`GenericRedisCache`] | Two-tier cache (memory L1, Redis L2) with compression |
//! | [`AiResponseCache`] | Deterministic keys and per-operation TTLs for AI responses |
//! | [`CachePerformanceMonitor`] | Latency, hit-rate and compression metrics |
//! | [`CacheConfig`] | Preset-driven configuration consumed by [`build_cache`] |
//!
//! ## Example
//!
//! ```rust,no_run
//! use ai_response_cache::cache::{build_cache, CacheConfig, CachePerformanceMonitor, CachePreset};
//! use std::sync::Arc;
//!
//! # async fn run() -> ai_response_cache::Result<()> {
//! let config = CacheConfig::from_preset(CachePreset::AiProduction)
//!     .with_redis_url("redis://localhost:6379");
//! let cache = build_cache(&config, Arc::new(CachePerformanceMonitor::new())).await?;
//! cache.set("greeting", serde_json::json!("hello"), None).await?;
//! # Ok(())
//! # }
//! ```

mod ai;
mod backend;
mod compression;
mod config;
mod key;
mod memory;
mod monitor;
mod redis;
mod remote;

pub use ai::{default_operation_ttls, AiCacheConfig, AiResponseCache, CachedResponse};
pub use backend::{CacheInterface, NullCache};
pub use compression::{EncodedPayload, PayloadCodec};
pub use config::{build_cache, CacheConfig, CacheImplementation, CachePreset};
pub use key::{canonical_json, CacheKeyGenerator, TextTier};
pub use memory::{InMemoryCache, MemoryCacheStats};
pub use monitor::{
    CachePerformanceMonitor, CompressionStats, InvalidationEvent, LookupOutcome,
    OperationHitStats, PerformanceStats,
};
pub use redis::{
    CacheHealth, CacheStatsSnapshot, ConnectionState, GenericRedisCache, RedisCacheConfig,
};
pub use remote::{InMemoryRemoteStore, RedisStore, RemoteEntry, RemoteStore};
