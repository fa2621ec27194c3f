//! Remote (L2) storage abstraction and its Redis implementation.

use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// A payload read from the remote tier with its remaining lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntry {
    pub payload: Vec<u8>,
    /// `None` when the key has no expiry.
    pub ttl: Option<Duration>,
}

/// Byte-oriented key/value store with server-side expiry.
///
/// Implementations report every failure as `Err`; deciding how to degrade
/// is left to [`super::GenericRedisCache`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn ping(&self) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<RemoteEntry>>;
    async fn set(&self, key: &str, payload: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn exists(&self, key: &str) -> Result<bool>;
    /// Keys matching a Redis glob pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
    async fn delete_many(&self, keys: &[String]) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// `COUNT` hint per `SCAN` round trip.
const SCAN_BATCH: usize = 500;

fn redis_err(op: &str, e: redis::RedisError) -> Error {
    Error::backend_with_context(
        format!("Redis {} error: {}", op, e),
        ErrorContext::new().with_source("redis_store"),
    )
}

/// Redis store over a [`ConnectionManager`].
///
/// The manager is a multiplexed connection that reconnects on its own and
/// is cheap to clone, so concurrent tasks share it without serializing.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid Redis URL: {}", e),
                ErrorContext::new()
                    .with_field_path("redis_url")
                    .with_source("redis_store"),
            )
        })?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| redis_err("connect", e))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_err("PING", e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<RemoteEntry>> {
        let mut conn = self.conn.clone();
        let (payload, pttl): (Option<Vec<u8>>, i64) = redis::pipe()
            .get(key)
            .pttl(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_err("GET", e))?;
        Ok(payload.map(|payload| RemoteEntry {
            payload,
            ttl: (pttl > 0).then(|| Duration::from_millis(pttl as u64)),
        }))
    }

    async fn set(&self, key: &str, payload: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let millis = (ttl.as_millis() as u64).max(1);
        let _: () = conn
            .pset_ex(key, payload, millis)
            .await
            .map_err(|e| redis_err("PSETEX", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(key).await.map_err(|e| redis_err("DEL", e))?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(|e| redis_err("EXISTS", e))
    }

    /// Walks the keyspace with `SCAN ... MATCH` so large databases are never
    /// blocked by a single `KEYS` call.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| redis_err("SCAN", e))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may report a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let deleted: i64 = conn
            .del(keys.to_vec())
            .await
            .map_err(|e| redis_err("DEL", e))?;
        Ok(deleted as usize)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// In-process remote store for testing and local development.
///
/// `set_available(false)` makes every call fail, simulating an outage.
pub struct InMemoryRemoteStore {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
    available: AtomicBool,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Raw stored bytes, bypassing expiry. Lets tests inspect the wire format.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).map(|(b, _)| b.clone())
    }

    /// Overwrite the stored bytes for `key`, keeping a one hour expiry.
    pub fn put_raw(&self, key: &str, payload: &[u8]) {
        self.lock().insert(
            key.to_string(),
            (payload.to_vec(), Instant::now() + Duration::from_secs(3600)),
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, Instant)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::backend_with_context(
                "connection refused",
                ErrorContext::new().with_source("in_memory_remote_store"),
            ))
        }
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

fn glob_match(pattern: &str, key: &str) -> bool {
    super::redis::glob_to_regex(pattern)
        .map(|re| re.is_match(key))
        .unwrap_or(false)
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn ping(&self) -> Result<()> {
        self.check()
    }

    async fn get(&self, key: &str) -> Result<Option<RemoteEntry>> {
        self.check()?;
        let now = Instant::now();
        let mut entries = self.lock();
        let expired = entries.get(key).map(|(_, exp)| *exp <= now);
        if expired == Some(true) {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(payload, exp)| RemoteEntry {
            payload: payload.clone(),
            ttl: Some(exp.saturating_duration_since(now)),
        }))
    }

    async fn set(&self, key: &str, payload: &[u8], ttl: Duration) -> Result<()> {
        self.check()?;
        self.lock()
            .insert(key.to_string(), (payload.to_vec(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check()?;
        Ok(self.lock().remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.check()?;
        let now = Instant::now();
        Ok(self
            .lock()
            .get(key)
            .map(|(_, exp)| *exp > now)
            .unwrap_or(false))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.check()?;
        let now = Instant::now();
        Ok(self
            .lock()
            .iter()
            .filter(|(k, (_, exp))| *exp > now && glob_match(pattern, k))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        self.check()?;
        let mut entries = self.lock();
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
