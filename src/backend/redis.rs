//! Redis backend over a managed connection

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, RedisError};
use std::time::Duration;

use super::{CacheBackend, CacheStats};
use crate::config::CacheConfig;
use crate::error::CacheError;

/// Production backend: one managed connection to a remote Redis.
///
/// The manager transparently reconnects between calls; each call itself is
/// performed exactly once and never retried.
pub struct RedisBackend {
  connection: ConnectionManager,
}

impl RedisBackend {
  /// Connect using the supplied configuration.
  pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
    let client = Client::open(config.connection_url()).map_err(map_err)?;
    let manager_config = ConnectionManagerConfig::new()
      .set_connection_timeout(config.connect_timeout())
      .set_response_timeout(config.response_timeout());
    let connection = ConnectionManager::new_with_config(client, manager_config)
      .await
      .map_err(map_err)?;
    tracing::info!("cache backend connected: {}:{}", config.host, config.port);
    Ok(Self { connection })
  }
}

fn map_err(e: RedisError) -> CacheError {
  if e.is_timeout() {
    CacheError::Timeout(e.to_string())
  } else if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
    CacheError::Connection(e.to_string())
  } else {
    CacheError::Backend(e.to_string())
  }
}

/// Write-path error mapping: protocol-level rejection becomes `WriteFailed`,
/// connectivity classes pass through unchanged.
fn write_err(key: &str, e: RedisError) -> CacheError {
  match map_err(e) {
    CacheError::Backend(reason) => CacheError::WriteFailed {
      key: key.to_string(),
      reason,
    },
    other => other,
  }
}

#[async_trait]
impl CacheBackend for RedisBackend {
  async fn ping(&self) -> Result<(), CacheError> {
    let mut conn = self.connection.clone();
    redis::cmd("PING")
      .query_async::<()>(&mut conn)
      .await
      .map_err(map_err)
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
    let mut conn = self.connection.clone();
    let payload: Option<Vec<u8>> = conn.get(key).await.map_err(map_err)?;
    Ok(payload)
  }

  async fn set(
    &self,
    key: &str,
    payload: Vec<u8>,
    ttl: Option<Duration>,
  ) -> Result<(), CacheError> {
    let mut conn = self.connection.clone();
    let result: Result<(), RedisError> = match ttl {
      Some(duration) => conn.set_ex(key, payload, duration.as_secs()).await,
      None => conn.set(key, payload).await,
    };
    result.map_err(|e| write_err(key, e))
  }

  async fn set_if_absent(
    &self,
    key: &str,
    payload: Vec<u8>,
    ttl: Option<Duration>,
  ) -> Result<bool, CacheError> {
    let reply = self.conditional_set(key, payload, ttl, "NX").await?;
    Ok(reply)
  }

  async fn set_if_present(
    &self,
    key: &str,
    payload: Vec<u8>,
    ttl: Option<Duration>,
  ) -> Result<bool, CacheError> {
    let reply = self.conditional_set(key, payload, ttl, "XX").await?;
    Ok(reply)
  }

  async fn delete(&self, key: &str) -> Result<bool, CacheError> {
    let mut conn = self.connection.clone();
    let removed: i64 = conn.del(key).await.map_err(map_err)?;
    Ok(removed > 0)
  }

  async fn exists(&self, key: &str) -> Result<bool, CacheError> {
    let mut conn = self.connection.clone();
    let found: bool = conn.exists(key).await.map_err(map_err)?;
    Ok(found)
  }

  async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
    let mut conn = self.connection.clone();
    let applied: bool = conn
      .expire(key, ttl.as_secs() as i64)
      .await
      .map_err(map_err)?;
    Ok(applied)
  }

  async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
    let mut conn = self.connection.clone();
    let keys: Vec<String> = conn.keys(pattern).await.map_err(map_err)?;
    Ok(keys)
  }

  async fn delete_many(&self, keys: &[String]) -> Result<usize, CacheError> {
    if keys.is_empty() {
      return Ok(0);
    }
    let mut conn = self.connection.clone();
    let removed: usize = conn.del(keys.to_vec()).await.map_err(map_err)?;
    Ok(removed)
  }

  async fn flush(&self) -> Result<(), CacheError> {
    let mut conn = self.connection.clone();
    redis::cmd("FLUSHDB")
      .query_async::<()>(&mut conn)
      .await
      .map_err(map_err)
  }

  async fn stats(&self) -> Result<CacheStats, CacheError> {
    let mut conn = self.connection.clone();
    let info: String = redis::cmd("INFO")
      .query_async(&mut conn)
      .await
      .map_err(map_err)?;
    let keys: usize = redis::cmd("DBSIZE")
      .query_async(&mut conn)
      .await
      .map_err(map_err)?;

    let mut stats = CacheStats {
      keys,
      ..Default::default()
    };
    for line in info.lines() {
      if let Some(val) = line.strip_prefix("keyspace_hits:") {
        stats.hits = val.trim().parse().unwrap_or(0);
      } else if let Some(val) = line.strip_prefix("keyspace_misses:") {
        stats.misses = val.trim().parse().unwrap_or(0);
      } else if let Some(val) = line.strip_prefix("used_memory:") {
        stats.memory_used = val.trim().parse().unwrap_or(0);
      } else if let Some(val) = line.strip_prefix("maxmemory:") {
        stats.memory_limit = val.trim().parse().unwrap_or(0);
      }
    }
    Ok(stats)
  }
}

impl RedisBackend {
  /// `SET key payload [NX|XX] [EX secs]` in one round-trip. Redis answers
  /// nil when the condition is not met.
  async fn conditional_set(
    &self,
    key: &str,
    payload: Vec<u8>,
    ttl: Option<Duration>,
    condition: &str,
  ) -> Result<bool, CacheError> {
    let mut conn = self.connection.clone();
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(payload).arg(condition);
    if let Some(duration) = ttl {
      cmd.arg("EX").arg(duration.as_secs());
    }
    let reply: Option<String> = cmd
      .query_async(&mut conn)
      .await
      .map_err(|e| write_err(key, e))?;
    Ok(reply.is_some())
  }
}
