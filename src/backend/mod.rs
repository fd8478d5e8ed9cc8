//! Backend connection adapters

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CacheError;

/// Store-wide counters reported by the backend.
///
/// Cumulative since the backend last restarted, not scoped to a caller or a
/// key prefix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
  pub hits: u64,
  pub misses: u64,
  pub keys: usize,
  pub memory_used: usize,
  pub memory_limit: usize,
}

impl CacheStats {
  /// Total lookups (hits + misses).
  pub fn get_attempts(&self) -> u64 {
    self.hits + self.misses
  }

  pub fn hit_rate(&self) -> f64 {
    let total = self.hits + self.misses;
    if total == 0 {
      0.0
    } else {
      self.hits as f64 / total as f64
    }
  }
}

/// Byte-level operations against the remote store.
///
/// The serialization adapter sits above this seam; implementations move
/// opaque payloads. A `ttl` of `None` means no expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
  async fn ping(&self) -> Result<(), CacheError>;
  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
  async fn set(&self, key: &str, payload: Vec<u8>, ttl: Option<Duration>)
    -> Result<(), CacheError>;
  /// Atomic create-if-missing. Returns whether the entry was created.
  async fn set_if_absent(
    &self,
    key: &str,
    payload: Vec<u8>,
    ttl: Option<Duration>,
  ) -> Result<bool, CacheError>;
  /// Atomic overwrite-if-present. Returns whether the entry existed.
  async fn set_if_present(
    &self,
    key: &str,
    payload: Vec<u8>,
    ttl: Option<Duration>,
  ) -> Result<bool, CacheError>;
  async fn delete(&self, key: &str) -> Result<bool, CacheError>;
  async fn exists(&self, key: &str) -> Result<bool, CacheError>;
  async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;
  async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
  async fn delete_many(&self, keys: &[String]) -> Result<usize, CacheError>;
  async fn flush(&self) -> Result<(), CacheError>;
  async fn stats(&self) -> Result<CacheStats, CacheError>;
}
