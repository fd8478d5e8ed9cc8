//! Cache error taxonomy

use thiserror::Error;

/// Errors surfaced by cache operations.
///
/// Connectivity classes (`Connection`, `Timeout`) are surfaced for the
/// caller's retry decision; every backend call is performed exactly once and
/// never retried here. The transaction and key-validation classes are
/// programmer misuse.
#[derive(Debug, Error)]
pub enum CacheError {
  /// Backend unreachable or the connection dropped mid-call.
  #[error("cache backend unreachable: {0}")]
  Connection(String),

  /// A connect or response deadline elapsed.
  #[error("cache backend timed out: {0}")]
  Timeout(String),

  /// The backend answered with a protocol-level error.
  #[error("cache backend error: {0}")]
  Backend(String),

  /// The backend rejected a write. Cache writes are assumed to succeed, so
  /// callers treat this as fatal.
  #[error("cache write failed for key {key}: {reason}")]
  WriteFailed { key: String, reason: String },

  #[error("empty cache key")]
  EmptyKey,

  #[error("cache payload codec error: {0}")]
  Codec(#[from] serde_json::Error),

  /// A mutation or commit was attempted with no open transaction.
  #[error("no open cache transaction")]
  NoTransaction,

  /// `begin` was called while a transaction is already open on this instance.
  #[error("a cache transaction is already open for key {0}")]
  TransactionOpen(String),

  /// `begin` targeted a key whose value is missing or not a mapping, or a
  /// row update targeted a slot holding a non-mapping.
  #[error("cannot stage {key}: value is missing or not a mapping")]
  NotAnAggregate { key: String },

  #[error("unknown field {field} in cached aggregate {key}")]
  FieldNotFound { field: String, key: String },

  #[error("field {field} in cached aggregate {key} is not numeric")]
  NonNumericDelta { field: String, key: String },

  /// Bulk column update with unequal row and value counts.
  #[error("bulk update length mismatch: {rows} row ids, {values} values")]
  LengthMismatch { rows: usize, values: usize },
}

impl CacheError {
  /// True for connectivity failures a caller may reasonably retry.
  pub fn is_retryable(&self) -> bool {
    matches!(self, CacheError::Connection(_) | CacheError::Timeout(_))
  }
}
