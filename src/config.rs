//! Cache client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Connection and behavior settings for the aggregate cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
  /// Backend host
  #[serde(default = "default_host")]
  pub host: String,

  /// Backend port
  #[serde(default = "default_port")]
  pub port: u16,

  /// Backend password (optional)
  #[serde(default)]
  pub password: Option<String>,

  /// Backend database number
  #[serde(default)]
  pub database: u8,

  /// Enable TLS
  #[serde(default)]
  pub tls_enabled: bool,

  /// Connect timeout in milliseconds
  #[serde(default = "default_connect_timeout_ms")]
  pub connect_timeout_ms: u64,

  /// Per-call response timeout in milliseconds
  #[serde(default = "default_response_timeout_ms")]
  pub response_timeout_ms: u64,

  /// TTL in seconds applied when a call does not name one (0 = no expiry)
  #[serde(default = "default_ttl_secs")]
  pub default_ttl_secs: u64,
}

fn default_host() -> String {
  "localhost".to_string()
}

fn default_port() -> u16 {
  6379
}

fn default_connect_timeout_ms() -> u64 {
  5000
}

fn default_response_timeout_ms() -> u64 {
  5000
}

fn default_ttl_secs() -> u64 {
  // 30 days
  2_592_000
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      password: None,
      database: 0,
      tls_enabled: false,
      connect_timeout_ms: default_connect_timeout_ms(),
      response_timeout_ms: default_response_timeout_ms(),
      default_ttl_secs: default_ttl_secs(),
    }
  }
}

impl CacheConfig {
  /// Load configuration from a YAML file.
  pub fn load(path: &str) -> Result<Self, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&raw)?)
  }

  /// Generate the backend connection URL.
  pub fn connection_url(&self) -> String {
    let scheme = if self.tls_enabled { "rediss" } else { "redis" };
    let auth = match &self.password {
      Some(pwd) if !pwd.is_empty() => format!(":{}@", pwd),
      _ => String::new(),
    };
    format!(
      "{}://{}{}:{}/{}",
      scheme, auth, self.host, self.port, self.database
    )
  }

  pub fn connect_timeout(&self) -> Duration {
    Duration::from_millis(self.connect_timeout_ms)
  }

  pub fn response_timeout(&self) -> Duration {
    Duration::from_millis(self.response_timeout_ms)
  }
}

/// Config loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("cannot read config file: {0}")]
  Io(#[from] std::io::Error),
  #[error("malformed config file: {0}")]
  Parse(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = CacheConfig::default();
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 6379);
    assert_eq!(config.database, 0);
    assert_eq!(config.default_ttl_secs, 2_592_000);
    assert!(!config.tls_enabled);
  }

  #[test]
  fn test_partial_yaml_fills_defaults() {
    let config: CacheConfig = serde_yaml::from_str("host: cache.internal\nport: 6380\n").unwrap();
    assert_eq!(config.host, "cache.internal");
    assert_eq!(config.port, 6380);
    assert_eq!(config.password, None);
    assert_eq!(config.default_ttl_secs, 2_592_000);
  }

  #[test]
  fn test_connection_url() {
    let mut config = CacheConfig::default();
    assert_eq!(config.connection_url(), "redis://localhost:6379/0");

    config.password = Some("hunter2".to_string());
    config.database = 3;
    assert_eq!(config.connection_url(), "redis://:hunter2@localhost:6379/3");

    config.tls_enabled = true;
    assert!(config.connection_url().starts_with("rediss://"));
  }
}
