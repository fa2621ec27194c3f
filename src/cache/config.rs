//! Preset-driven cache configuration and the cache factory.
//!
//! The application picks a [`CachePreset`], optionally overrides fields, and
//! hands the resulting [`CacheConfig`] to [`build_cache`]. Nothing here reads
//! the environment.

use super::ai::{AiCacheConfig, AiResponseCache};
use super::backend::{CacheInterface, NullCache};
use super::memory::InMemoryCache;
use super::monitor::CachePerformanceMonitor;
use super::redis::{GenericRedisCache, RedisCacheConfig};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheImplementation {
    Null,
    Memory,
    Redis,
    AiRedis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePreset {
    Disabled,
    Simple,
    Development,
    Production,
    AiDevelopment,
    AiProduction,
}

impl CachePreset {
    pub const ALL: [CachePreset; 6] = [
        CachePreset::Disabled,
        CachePreset::Simple,
        CachePreset::Development,
        CachePreset::Production,
        CachePreset::AiDevelopment,
        CachePreset::AiProduction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CachePreset::Disabled => "disabled",
            CachePreset::Simple => "simple",
            CachePreset::Development => "development",
            CachePreset::Production => "production",
            CachePreset::AiDevelopment => "ai-development",
            CachePreset::AiProduction => "ai-production",
        }
    }
}

impl fmt::Display for CachePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CachePreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        CachePreset::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| {
                Error::configuration_with_context(
                    format!("unknown cache preset '{}'", s),
                    ErrorContext::new()
                        .with_field_path("preset")
                        .with_details(
                            CachePreset::ALL
                                .iter()
                                .map(|p| p.as_str())
                                .collect::<Vec<_>>()
                                .join(", "),
                        )
                        .with_source("cache_config"),
                )
            })
    }
}

/// Plain-data cache settings. Durations are in seconds unless suffixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub implementation: CacheImplementation,
    pub redis_url: String,
    pub default_ttl: u64,
    pub memory_cache_size: usize,
    pub enable_l1_cache: bool,
    pub compression_threshold: usize,
    pub compression_level: u32,
    pub key_prefix: Option<String>,
    pub text_hash_threshold: usize,
    pub operation_ttls: HashMap<String, u64>,
    pub connect_timeout_ms: u64,
    pub operation_timeout_ms: u64,
    pub reconnect_cooldown: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from_preset(CachePreset::Simple)
    }
}

fn default_operation_ttl_secs() -> HashMap<String, u64> {
    super::ai::default_operation_ttls()
        .into_iter()
        .map(|(op, ttl)| (op, ttl.as_secs()))
        .collect()
}

impl CacheConfig {
    pub fn from_preset(preset: CachePreset) -> Self {
        let base = Self {
            implementation: CacheImplementation::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            default_ttl: 3600,
            memory_cache_size: 100,
            enable_l1_cache: true,
            compression_threshold: 1000,
            compression_level: 6,
            key_prefix: None,
            text_hash_threshold: 1000,
            operation_ttls: HashMap::new(),
            connect_timeout_ms: 5_000,
            operation_timeout_ms: 2_000,
            reconnect_cooldown: 30,
        };
        match preset {
            CachePreset::Disabled => Self {
                implementation: CacheImplementation::Null,
                enable_l1_cache: false,
                ..base
            },
            CachePreset::Simple => base,
            CachePreset::Development => Self {
                implementation: CacheImplementation::Redis,
                default_ttl: 1800,
                compression_threshold: 2000,
                key_prefix: Some("dev:".to_string()),
                ..base
            },
            CachePreset::Production => Self {
                implementation: CacheImplementation::Redis,
                default_ttl: 7200,
                memory_cache_size: 500,
                compression_level: 6,
                reconnect_cooldown: 15,
                ..base
            },
            CachePreset::AiDevelopment => Self {
                implementation: CacheImplementation::AiRedis,
                default_ttl: 1800,
                text_hash_threshold: 500,
                operation_ttls: default_operation_ttl_secs(),
                key_prefix: Some("dev:".to_string()),
                ..base
            },
            CachePreset::AiProduction => Self {
                implementation: CacheImplementation::AiRedis,
                default_ttl: 7200,
                memory_cache_size: 1000,
                text_hash_threshold: 1000,
                compression_level: 6,
                operation_ttls: default_operation_ttl_secs(),
                reconnect_cooldown: 15,
                ..base
            },
        }
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    pub fn with_default_ttl(mut self, secs: u64) -> Self {
        self.default_ttl = secs;
        self
    }

    pub fn with_memory_cache_size(mut self, size: usize) -> Self {
        self.memory_cache_size = size;
        self
    }

    pub fn with_compression_threshold(mut self, bytes: usize) -> Self {
        self.compression_threshold = bytes;
        self
    }

    pub fn with_operation_ttl(mut self, operation: impl Into<String>, secs: u64) -> Self {
        self.operation_ttls.insert(operation.into(), secs);
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn redis_config(&self) -> RedisCacheConfig {
        RedisCacheConfig {
            redis_url: self.redis_url.clone(),
            default_ttl: Duration::from_secs(self.default_ttl),
            enable_l1_cache: self.enable_l1_cache,
            memory_cache_size: self.memory_cache_size,
            compression_threshold: self.compression_threshold,
            compression_level: self.compression_level,
            key_prefix: self.key_prefix.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            operation_timeout: Duration::from_millis(self.operation_timeout_ms),
            reconnect_cooldown: Duration::from_secs(self.reconnect_cooldown),
        }
    }

    pub fn ai_config(&self) -> AiCacheConfig {
        AiCacheConfig::new()
            .with_text_hash_threshold(self.text_hash_threshold)
            .with_default_ttl(Duration::from_secs(self.default_ttl))
            .with_operation_ttls(
                self.operation_ttls
                    .iter()
                    .map(|(op, secs)| (op.clone(), Duration::from_secs(*secs)))
                    .collect(),
            )
    }

    pub fn validate(&self) -> Result<()> {
        // AI settings are validated even when the implementation ignores them
        if let Some((op, _)) = self.operation_ttls.iter().find(|(_, ttl)| **ttl == 0) {
            return Err(Error::invalid_field(
                "cache_config",
                format!("operation_ttls.{}", op),
                "must be > 0",
            ));
        }
        if self.text_hash_threshold == 0 {
            return Err(Error::invalid_field(
                "cache_config",
                "text_hash_threshold",
                "must be > 0",
            ));
        }
        match self.implementation {
            CacheImplementation::Null => Ok(()),
            CacheImplementation::Memory => {
                if self.memory_cache_size == 0 {
                    return Err(Error::invalid_field(
                        "cache_config",
                        "memory_cache_size",
                        "must be > 0",
                    ));
                }
                if self.default_ttl == 0 {
                    return Err(Error::invalid_field("cache_config", "default_ttl", "must be > 0"));
                }
                Ok(())
            }
            CacheImplementation::Redis => self.redis_config().validate(),
            CacheImplementation::AiRedis => {
                self.redis_config().validate()?;
                self.ai_config().validate()
            }
        }
    }
}

/// Build and, for Redis-backed implementations, connect the configured cache.
///
/// An unreachable Redis does not fail the build; the cache starts degraded.
pub async fn build_cache(
    config: &CacheConfig,
    monitor: Arc<CachePerformanceMonitor>,
) -> Result<Arc<dyn CacheInterface>> {
    config.validate()?;
    let cache: Arc<dyn CacheInterface> = match config.implementation {
        CacheImplementation::Null => Arc::new(NullCache::new()),
        CacheImplementation::Memory => Arc::new(InMemoryCache::new(
            config.memory_cache_size,
            Duration::from_secs(config.default_ttl),
        )),
        CacheImplementation::Redis => {
            let cache = GenericRedisCache::new(config.redis_config(), monitor)?;
            cache.connect().await;
            Arc::new(cache)
        }
        CacheImplementation::AiRedis => {
            let redis = GenericRedisCache::new(config.redis_config(), monitor.clone())?;
            redis.connect().await;
            Arc::new(AiResponseCache::new(
                Arc::new(redis),
                config.ai_config(),
                monitor,
            )?)
        }
    };
    tracing::info!(backend = cache.name(), "cache initialised");
    Ok(cache)
}
