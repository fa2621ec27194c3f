//! # ai-response-cache
//!
//! Layered caching for AI text-processing services, plus the benchmark and
//! regression-detection tooling used to gate changes to it.
//!
//! ## Overview
//!
//! Model calls are slow and billed per token, so identical requests should be
//! answered from cache. This crate provides a process-local LRU cache, a
//! two-tier cache backed by Redis with transparent compression, and an
//! AI-aware layer that turns `(text, operation, options)` into stable keys
//! with per-operation TTLs.
//!
//! ## Core Philosophy
//!
//! - **Best-effort**: a cache failure is never a request failure; Redis
//!   outages degrade to memory-only operation
//! - **Composable**: every cache implements [`cache::CacheInterface`], and the
//!   AI layer wraps any of them
//! - **Measured**: a shared [`cache::CachePerformanceMonitor`] and the
//!   [`benchmarks`] harness make regressions visible before deployment
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_response_cache::cache::{
//!     AiCacheConfig, AiResponseCache, CachePerformanceMonitor, GenericRedisCache, RedisCacheConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ai_response_cache::Result<()> {
//!     let monitor = Arc::new(CachePerformanceMonitor::new());
//!     let redis = GenericRedisCache::new(RedisCacheConfig::new(), monitor.clone())?;
//!     redis.connect().await;
//!
//!     let cache = AiResponseCache::new(Arc::new(redis), AiCacheConfig::new(), monitor)?;
//!     let options = serde_json::json!({"max_length": 100});
//!     if cache.get_cached_response("some text", "summarize", &options).await?.is_none() {
//!         let summary = serde_json::json!({"summary": "..."});
//!         cache.cache_response("some text", "summarize", &options, summary).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Cache implementations, configuration presets and monitoring |
//! | [`benchmarks`] | Benchmark harness, result models and regression detection |
//! | [`utils`] | Statistics and process memory sampling |
//! | [`error`] | Crate error type |

pub mod benchmarks;
pub mod cache;
pub mod utils;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
