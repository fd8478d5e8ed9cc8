//! Serialization adapter between [`Value`] and the backend byte payload

use crate::error::CacheError;
use crate::value::Value;

/// Encode a value into its backend byte representation.
pub fn encode(value: &Value) -> Result<Vec<u8>, CacheError> {
  Ok(serde_json::to_vec(value)?)
}

/// Decode a backend payload back into a value.
pub fn decode(payload: &[u8]) -> Result<Value, CacheError> {
  Ok(serde_json::from_slice(payload)?)
}
