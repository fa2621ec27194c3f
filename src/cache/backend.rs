//! The common cache contract and the no-op implementation.

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Contract shared by every cache tier and by the benchmark harness.
///
/// A miss is `Ok(None)`, never an error. The built-in caches absorb
/// infrastructure failures (Redis down, corrupt payloads) and return a miss
/// or a silent no-op; `Err` is reserved for implementations that cannot
/// degrade and is counted, not trusted, by the benchmark harness.
#[async_trait]
pub trait CacheInterface: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    /// `ttl: None` applies the implementation's default TTL.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;
    /// Idempotent: deleting a missing key is a no-op.
    async fn delete(&self, key: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Cache that stores nothing. Backs the `disabled` preset.
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheInterface for NullCache {
    async fn get(&self, _: &str) -> Result<Option<Value>> {
        Ok(None)
    }
    async fn set(&self, _: &str, _: Value, _: Option<Duration>) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &str) -> Result<()> {
        Ok(())
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
