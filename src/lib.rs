//! Aggregate object cache over a remote TTL key-value store.
//!
//! Callers load a composite record (a mapping, possibly of row mappings),
//! mutate pieces of it in memory through the transaction API, and commit the
//! whole aggregate back as one serialized blob under a refreshed expiry.
//! Scalar set/get/delete operations, store-wide stats, and bulk eviction sit
//! alongside.

pub mod backend;
mod cache;
mod codec;
pub mod config;
mod error;
mod txn;
mod value;

pub use backend::memory::MemoryBackend;
pub use backend::redis::RedisBackend;
pub use backend::{CacheBackend, CacheStats};
pub use cache::AggregateCache;
pub use config::{CacheConfig, ConfigError};
pub use error::CacheError;
pub use txn::FieldOp;
pub use value::Value;
