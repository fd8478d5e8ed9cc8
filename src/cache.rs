//! Aggregate cache client: scalar operations, stats, bulk eviction

use std::sync::Arc;
use std::time::Duration;

use crate::backend::redis::RedisBackend;
use crate::backend::{CacheBackend, CacheStats};
use crate::codec;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::txn::OpenTransaction;
use crate::value::Value;

/// Client for a remote TTL key-value store, caching composite records.
///
/// One instance holds at most one open transaction; instances share the
/// backend through an `Arc`, so give each logical transaction its own
/// instance (see [`AggregateCache::handle`]).
///
/// TTL arguments are seconds: `None` means the configured default,
/// `Some(0)` means no expiry.
pub struct AggregateCache {
  backend: Arc<dyn CacheBackend>,
  default_ttl_secs: u64,
  pub(crate) txn: Option<OpenTransaction>,
}

impl AggregateCache {
  /// Build a client over an already-connected backend.
  pub fn new(backend: Arc<dyn CacheBackend>, default_ttl_secs: u64) -> Self {
    Self {
      backend,
      default_ttl_secs,
      txn: None,
    }
  }

  /// Connect to the configured Redis backend and build a client over it.
  pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
    let backend = RedisBackend::connect(config).await?;
    Ok(Self::new(Arc::new(backend), config.default_ttl_secs))
  }

  /// A second client over the same backend, with no transaction state.
  pub fn handle(&self) -> Self {
    Self {
      backend: self.backend.clone(),
      default_ttl_secs: self.default_ttl_secs,
      txn: None,
    }
  }

  /// Round-trip a health check to the backend.
  pub async fn ping(&self) -> Result<(), CacheError> {
    self.backend.ping().await
  }

  /// Unconditional write.
  pub async fn set(&self, key: &str, value: &Value, ttl: Option<u64>) -> Result<(), CacheError> {
    ensure_key(key)?;
    let payload = codec::encode(value)?;
    self.backend.set(key, payload, self.resolve_ttl(ttl)).await
  }

  /// Atomic create-if-missing. Returns whether the entry was created.
  pub async fn set_if_absent(
    &self,
    key: &str,
    value: &Value,
    ttl: Option<u64>,
  ) -> Result<bool, CacheError> {
    ensure_key(key)?;
    let payload = codec::encode(value)?;
    self
      .backend
      .set_if_absent(key, payload, self.resolve_ttl(ttl))
      .await
  }

  /// Atomic overwrite-if-present. Returns whether the entry existed.
  pub async fn replace_if_exists(
    &self,
    key: &str,
    value: &Value,
    ttl: Option<u64>,
  ) -> Result<bool, CacheError> {
    ensure_key(key)?;
    let payload = codec::encode(value)?;
    self
      .backend
      .set_if_present(key, payload, self.resolve_ttl(ttl))
      .await
  }

  /// Fetch and deserialize the value at `key`. `None` on miss or expiry.
  pub async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
    ensure_key(key)?;
    match self.backend.get(key).await? {
      Some(payload) => Ok(Some(codec::decode(&payload)?)),
      None => Ok(None),
    }
  }

  /// Idempotent removal. Returns whether the key existed.
  pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
    ensure_key(key)?;
    self.backend.delete(key).await
  }

  pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
    ensure_key(key)?;
    self.backend.exists(key).await
  }

  /// Refresh the expiry of an existing entry without rewriting its payload.
  /// Returns whether the entry existed.
  pub async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, CacheError> {
    ensure_key(key)?;
    self
      .backend
      .expire(key, Duration::from_secs(ttl_secs))
      .await
  }

  /// Clear the entire backend namespace. Destructive; operational tooling
  /// only, never request-path code.
  pub async fn flush_all(&self) -> Result<(), CacheError> {
    tracing::warn!("flushing entire cache namespace");
    self.backend.flush().await
  }

  /// Delete every key matching a glob pattern (`*`, `?`, `[...]`) and return
  /// the count removed. Enumerates the whole keyspace; O(keys in backend),
  /// not for hot paths.
  pub async fn flush_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
    let keys = self.backend.keys(pattern).await?;
    if keys.is_empty() {
      return Ok(0);
    }
    let removed = self.backend.delete_many(&keys).await?;
    tracing::info!("evicted {} keys matching {}", removed, pattern);
    Ok(removed)
  }

  /// Enumerate keys matching a glob pattern. O(keys in backend).
  pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
    self.backend.keys(pattern).await
  }

  /// Store-wide counters since the backend last restarted.
  pub async fn stats(&self) -> Result<CacheStats, CacheError> {
    self.backend.stats().await
  }

  fn resolve_ttl(&self, ttl: Option<u64>) -> Option<Duration> {
    let secs = ttl.unwrap_or(self.default_ttl_secs);
    (secs > 0).then(|| Duration::from_secs(secs))
  }
}

fn ensure_key(key: &str) -> Result<(), CacheError> {
  if key.is_empty() {
    Err(CacheError::EmptyKey)
  } else {
    Ok(())
  }
}
