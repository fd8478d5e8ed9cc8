//! Aggregate transaction tests

use std::collections::BTreeMap;
use std::sync::Arc;

use acorn_cache::{AggregateCache, CacheError, FieldOp, MemoryBackend, Value};

fn cache() -> AggregateCache {
  AggregateCache::new(Arc::new(MemoryBackend::new()), 0)
}

fn fields(entries: Vec<(&str, FieldOp)>) -> BTreeMap<String, FieldOp> {
  entries
    .into_iter()
    .map(|(k, op)| (k.to_string(), op))
    .collect()
}

// =============================================================================
// State machine
// =============================================================================

#[tokio::test]
async fn test_begin_on_missing_key_enters_no_state() {
  let mut cache = cache();

  assert!(matches!(
    cache.begin("missing").await,
    Err(CacheError::NotAnAggregate { .. })
  ));
  assert!(!cache.in_transaction());

  // Every transaction operation on the same instance keeps failing.
  assert!(matches!(
    cache.update_row(None, &fields(vec![("a", FieldOp::Increment(1))])),
    Err(CacheError::NoTransaction)
  ));
  assert!(matches!(
    cache.update_column(&["1".to_string()], "a", vec![Value::Int(1)]),
    Err(CacheError::NoTransaction)
  ));
  assert!(matches!(
    cache.commit(None).await,
    Err(CacheError::NoTransaction)
  ));
}

#[tokio::test]
async fn test_begin_on_scalar_value_fails() {
  let mut cache = cache();
  cache.set("k", &Value::Text("not a map".to_string()), None).await.unwrap();

  assert!(matches!(
    cache.begin("k").await,
    Err(CacheError::NotAnAggregate { .. })
  ));
  assert!(!cache.in_transaction());
}

#[tokio::test]
async fn test_begin_while_open_is_rejected() {
  let mut cache = cache();
  cache.set("a", &Value::parse(r#"{"x": 1}"#), None).await.unwrap();
  cache.set("b", &Value::parse(r#"{"y": 2}"#), None).await.unwrap();

  cache.begin("a").await.unwrap();
  assert!(matches!(
    cache.begin("b").await,
    Err(CacheError::TransactionOpen(key)) if key == "a"
  ));

  // The original transaction is intact and still commits.
  assert_eq!(cache.transaction_key(), Some("a"));
  cache.commit(None).await.unwrap();
  assert!(!cache.in_transaction());
}

#[tokio::test]
async fn test_commit_closes_the_transaction() {
  let mut cache = cache();
  cache.set("k", &Value::parse(r#"{"x": 1}"#), None).await.unwrap();

  cache.begin("k").await.unwrap();
  cache.commit(None).await.unwrap();

  assert!(!cache.in_transaction());
  assert!(matches!(
    cache.commit(None).await,
    Err(CacheError::NoTransaction)
  ));
}

#[tokio::test]
async fn test_cancel_discards_staged_state() {
  let mut cache = cache();
  let original = Value::parse(r#"{"count": 5}"#);
  cache.set("k", &original, None).await.unwrap();

  cache.begin("k").await.unwrap();
  cache
    .update_row(None, &fields(vec![("count", FieldOp::Set(Value::Int(99)))]))
    .unwrap();
  cache.cancel();
  cache.cancel(); // idempotent

  assert!(!cache.in_transaction());
  assert_eq!(cache.get("k").await.unwrap(), Some(original));
}

// =============================================================================
// update_row
// =============================================================================

#[tokio::test]
async fn test_increment_scenario() {
  let mut cache = cache();
  cache.set("k", &Value::parse(r#"{"count": 5}"#), None).await.unwrap();

  cache.begin("k").await.unwrap();
  cache
    .update_row(None, &fields(vec![("count", FieldOp::Increment(1))]))
    .unwrap();
  cache.commit(None).await.unwrap();

  assert_eq!(cache.get("k").await.unwrap(), Some(Value::parse(r#"{"count": 6}"#)));
}

#[tokio::test]
async fn test_decrement_and_float_delta() {
  let mut cache = cache();
  cache
    .set("k", &Value::parse(r#"{"seeders": 3, "ratio": 1.5}"#), None)
    .await
    .unwrap();

  cache.begin("k").await.unwrap();
  cache
    .update_row(
      None,
      &fields(vec![
        ("seeders", FieldOp::Decrement(1)),
        ("ratio", FieldOp::Increment(2)),
      ]),
    )
    .unwrap();
  cache.commit(None).await.unwrap();

  let stored = cache.get("k").await.unwrap().unwrap();
  let map = stored.as_map().unwrap();
  assert_eq!(map["seeders"], Value::Int(2));
  assert_eq!(map["ratio"], Value::Float(3.5));
}

#[tokio::test]
async fn test_unknown_field_applies_nothing() {
  let mut cache = cache();
  cache.set("k", &Value::parse(r#"{"a": 1, "b": 2}"#), None).await.unwrap();

  cache.begin("k").await.unwrap();
  // "a" is valid and validated first (sorted order), "zz" is not: the whole
  // call must be rejected with nothing applied.
  let result = cache.update_row(
    None,
    &fields(vec![("a", FieldOp::Set(Value::Int(9))), ("zz", FieldOp::Set(Value::Int(1)))]),
  );
  assert!(matches!(
    result,
    Err(CacheError::FieldNotFound { field, .. }) if field == "zz"
  ));

  cache.commit(None).await.unwrap();
  assert_eq!(cache.get("k").await.unwrap(), Some(Value::parse(r#"{"a": 1, "b": 2}"#)));
}

#[tokio::test]
async fn test_non_numeric_delta_applies_nothing() {
  let mut cache = cache();
  cache
    .set("k", &Value::parse(r#"{"count": 1, "name": "x"}"#), None)
    .await
    .unwrap();

  cache.begin("k").await.unwrap();
  let result = cache.update_row(
    None,
    &fields(vec![
      ("count", FieldOp::Increment(1)),
      ("name", FieldOp::Increment(1)),
    ]),
  );
  assert!(matches!(
    result,
    Err(CacheError::NonNumericDelta { field, .. }) if field == "name"
  ));

  cache.commit(None).await.unwrap();
  assert_eq!(
    cache.get("k").await.unwrap(),
    Some(Value::parse(r#"{"count": 1, "name": "x"}"#))
  );
}

#[tokio::test]
async fn test_update_row_targets_nested_row() {
  let mut cache = cache();
  cache
    .set("k", &Value::parse(r#"{"7": {"up": 10, "down": 4}}"#), None)
    .await
    .unwrap();

  cache.begin("k").await.unwrap();
  cache
    .update_row(
      Some("7"),
      &fields(vec![
        ("up", FieldOp::Increment(1)),
        ("down", FieldOp::Set(Value::Int(0))),
      ]),
    )
    .unwrap();
  cache.commit(None).await.unwrap();

  assert_eq!(
    cache.get("k").await.unwrap(),
    Some(Value::parse(r#"{"7": {"up": 11, "down": 0}}"#))
  );
}

#[tokio::test]
async fn test_update_row_on_missing_row_fails() {
  let mut cache = cache();
  cache.set("k", &Value::parse(r#"{"7": {"up": 1}}"#), None).await.unwrap();

  cache.begin("k").await.unwrap();
  let result = cache.update_row(Some("8"), &fields(vec![("up", FieldOp::Increment(1))]));
  assert!(matches!(
    result,
    Err(CacheError::FieldNotFound { field, .. }) if field == "8"
  ));
}

// =============================================================================
// update_column / replace_row
// =============================================================================

#[tokio::test]
async fn test_update_column_sets_field_across_rows() {
  let mut cache = cache();
  cache
    .set(
      "k",
      &Value::parse(r#"{"1": {"seeders": 0}, "2": {"seeders": 0}}"#),
      None,
    )
    .await
    .unwrap();

  cache.begin("k").await.unwrap();
  cache
    .update_column(
      &["1".to_string(), "2".to_string(), "3".to_string()],
      "seeders",
      vec![Value::Int(5), Value::Int(7), Value::Int(2)],
    )
    .unwrap();
  cache.commit(None).await.unwrap();

  // Row "3" did not exist and was created on the way.
  assert_eq!(
    cache.get("k").await.unwrap(),
    Some(Value::parse(
      r#"{"1": {"seeders": 5}, "2": {"seeders": 7}, "3": {"seeders": 2}}"#
    ))
  );
}

#[tokio::test]
async fn test_update_column_length_mismatch_applies_nothing() {
  let mut cache = cache();
  let original = Value::parse(r#"{"1": {"seeders": 0}}"#);
  cache.set("k", &original, None).await.unwrap();

  cache.begin("k").await.unwrap();
  let result = cache.update_column(
    &["1".to_string(), "2".to_string()],
    "seeders",
    vec![Value::Int(5)],
  );
  assert!(matches!(
    result,
    Err(CacheError::LengthMismatch { rows: 2, values: 1 })
  ));

  cache.commit(None).await.unwrap();
  assert_eq!(cache.get("k").await.unwrap(), Some(original));
}

#[tokio::test]
async fn test_update_column_on_scalar_row_applies_nothing() {
  let mut cache = cache();
  let original = Value::parse(r#"{"1": {"seeders": 0}, "2": "scalar"}"#);
  cache.set("k", &original, None).await.unwrap();

  cache.begin("k").await.unwrap();
  let result = cache.update_column(
    &["1".to_string(), "2".to_string()],
    "seeders",
    vec![Value::Int(5), Value::Int(7)],
  );
  assert!(matches!(result, Err(CacheError::NotAnAggregate { .. })));

  cache.commit(None).await.unwrap();
  assert_eq!(cache.get("k").await.unwrap(), Some(original));
}

#[tokio::test]
async fn test_replace_row_is_a_full_overwrite() {
  let mut cache = cache();
  cache
    .set("k", &Value::parse(r#"{"7": {"up": 1, "down": 2}}"#), None)
    .await
    .unwrap();

  cache.begin("k").await.unwrap();
  cache
    .replace_row("7", Value::parse(r#"{"up": 9}"#))
    .unwrap();
  cache.commit(None).await.unwrap();

  // Not a merge: "down" is gone.
  assert_eq!(
    cache.get("k").await.unwrap(),
    Some(Value::parse(r#"{"7": {"up": 9}}"#))
  );
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_last_commit_wins_whole() {
  let backend = Arc::new(MemoryBackend::new());
  let mut first = AggregateCache::new(backend, 0);
  let mut second = first.handle();

  first
    .set("k", &Value::parse(r#"{"count": 0, "flag": false}"#), None)
    .await
    .unwrap();

  // Both transactions stage from the same snapshot before either commits.
  first.begin("k").await.unwrap();
  second.begin("k").await.unwrap();

  first
    .update_row(None, &fields(vec![("count", FieldOp::Increment(1))]))
    .unwrap();
  second
    .update_row(None, &fields(vec![("flag", FieldOp::Set(Value::Bool(true)))]))
    .unwrap();

  first.commit(None).await.unwrap();
  second.commit(None).await.unwrap();

  // The stored value is exactly the second staged aggregate: the first
  // commit's increment is clobbered whole, never merged.
  assert_eq!(
    first.get("k").await.unwrap(),
    Some(Value::parse(r#"{"count": 0, "flag": true}"#))
  );
}
