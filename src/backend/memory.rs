//! In-process backend for tests and local development

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::{CacheBackend, CacheStats};
use crate::error::CacheError;

struct StoredEntry {
  payload: Vec<u8>,
  expires_at: Option<Instant>,
}

impl StoredEntry {
  fn new(payload: Vec<u8>, ttl: Option<Duration>) -> Self {
    Self {
      expires_at: ttl.map(|d| Instant::now() + d),
      payload,
    }
  }

  fn is_expired(&self) -> bool {
    self
      .expires_at
      .map(|exp| Instant::now() > exp)
      .unwrap_or(false)
  }
}

/// In-process `CacheBackend` with lazy TTL expiry.
///
/// Backs the test suite and local development; not a production store.
#[derive(Default)]
pub struct MemoryBackend {
  data: RwLock<HashMap<String, StoredEntry>>,
  hits: AtomicU64,
  misses: AtomicU64,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
  async fn ping(&self) -> Result<(), CacheError> {
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
    let mut data = self.data.write();
    match data.get(key) {
      Some(entry) if entry.is_expired() => {
        data.remove(key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
      }
      Some(entry) => {
        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(entry.payload.clone()))
      }
      None => {
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
      }
    }
  }

  async fn set(
    &self,
    key: &str,
    payload: Vec<u8>,
    ttl: Option<Duration>,
  ) -> Result<(), CacheError> {
    let mut data = self.data.write();
    data.insert(key.to_string(), StoredEntry::new(payload, ttl));
    Ok(())
  }

  async fn set_if_absent(
    &self,
    key: &str,
    payload: Vec<u8>,
    ttl: Option<Duration>,
  ) -> Result<bool, CacheError> {
    let mut data = self.data.write();
    let live = data.get(key).map(|e| !e.is_expired()).unwrap_or(false);
    if live {
      return Ok(false);
    }
    data.insert(key.to_string(), StoredEntry::new(payload, ttl));
    Ok(true)
  }

  async fn set_if_present(
    &self,
    key: &str,
    payload: Vec<u8>,
    ttl: Option<Duration>,
  ) -> Result<bool, CacheError> {
    let mut data = self.data.write();
    let live = data.get(key).map(|e| !e.is_expired()).unwrap_or(false);
    if !live {
      data.remove(key);
      return Ok(false);
    }
    data.insert(key.to_string(), StoredEntry::new(payload, ttl));
    Ok(true)
  }

  async fn delete(&self, key: &str) -> Result<bool, CacheError> {
    let mut data = self.data.write();
    match data.remove(key) {
      Some(entry) => Ok(!entry.is_expired()),
      None => Ok(false),
    }
  }

  async fn exists(&self, key: &str) -> Result<bool, CacheError> {
    let data = self.data.read();
    Ok(data.get(key).map(|e| !e.is_expired()).unwrap_or(false))
  }

  async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
    let mut data = self.data.write();
    match data.get_mut(key) {
      Some(entry) if !entry.is_expired() => {
        entry.expires_at = Some(Instant::now() + ttl);
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
    let data = self.data.read();
    if pattern == "*" {
      return Ok(
        data
          .iter()
          .filter(|(_, e)| !e.is_expired())
          .map(|(k, _)| k.clone())
          .collect(),
      );
    }
    let regex = glob_to_regex(pattern);
    Ok(
      data
        .iter()
        .filter(|(k, e)| !e.is_expired() && regex.is_match(k))
        .map(|(k, _)| k.clone())
        .collect(),
    )
  }

  async fn delete_many(&self, keys: &[String]) -> Result<usize, CacheError> {
    let mut data = self.data.write();
    let mut removed = 0;
    for key in keys {
      if let Some(entry) = data.remove(key) {
        if !entry.is_expired() {
          removed += 1;
        }
      }
    }
    Ok(removed)
  }

  async fn flush(&self) -> Result<(), CacheError> {
    self.data.write().clear();
    Ok(())
  }

  async fn stats(&self) -> Result<CacheStats, CacheError> {
    let data = self.data.read();
    let live = data.iter().filter(|(_, e)| !e.is_expired());
    let (keys, memory_used) = live.fold((0usize, 0usize), |(count, bytes), (k, e)| {
      (count + 1, bytes + k.len() + e.payload.len())
    });
    Ok(CacheStats {
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      keys,
      memory_used,
      memory_limit: 0,
    })
  }
}

/// Convert a glob pattern (`*`, `?`, `[...]`) to an anchored regex.
/// Character classes pass through; an unbalanced class yields a regex that
/// matches nothing.
fn glob_to_regex(pattern: &str) -> regex::Regex {
  let mut regex_str = String::with_capacity(pattern.len() * 2);
  regex_str.push('^');

  for c in pattern.chars() {
    match c {
      '*' => regex_str.push_str(".*"),
      '?' => regex_str.push('.'),
      '[' | ']' => regex_str.push(c),
      '.' | '+' | '(' | ')' | '{' | '}' | '|' | '^' | '$' | '\\' => {
        regex_str.push('\\');
        regex_str.push(c);
      }
      _ => regex_str.push(c),
    }
  }

  regex_str.push('$');
  regex::Regex::new(&regex_str).unwrap_or_else(|_| regex::Regex::new("^$").unwrap())
}
