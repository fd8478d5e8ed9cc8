//! Aggregate transaction subsystem
//!
//! Load an aggregate, stage field mutations in memory, write the whole value
//! back under a refreshed expiry. Commit is last-writer-wins: there is no
//! compare-and-swap against the stored value, so concurrent transactions on
//! the same key clobber each other whole. Callers needing stronger
//! guarantees serialize per key themselves.

use std::collections::BTreeMap;

use crate::cache::AggregateCache;
use crate::error::CacheError;
use crate::value::Value;

/// A staged mutation for one field of an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
  /// Overwrite the field.
  Set(Value),
  /// Add `delta` to the field's current numeric value.
  Increment(i64),
  /// Subtract `delta` from the field's current numeric value.
  Decrement(i64),
}

/// In-memory working copy of an aggregate during an open transaction.
pub(crate) struct OpenTransaction {
  pub(crate) key: String,
  pub(crate) staged: BTreeMap<String, Value>,
}

impl AggregateCache {
  /// Open a transaction on the aggregate stored at `key`.
  ///
  /// Errors if the key is missing, holds a non-mapping, or a transaction is
  /// already open on this instance. No state is entered on error.
  pub async fn begin(&mut self, key: &str) -> Result<(), CacheError> {
    if let Some(txn) = &self.txn {
      return Err(CacheError::TransactionOpen(txn.key.clone()));
    }
    let staged = match self.get(key).await? {
      Some(Value::Map(map)) => map,
      _ => {
        return Err(CacheError::NotAnAggregate {
          key: key.to_string(),
        })
      }
    };
    self.txn = Some(OpenTransaction {
      key: key.to_string(),
      staged,
    });
    Ok(())
  }

  /// Whether a transaction is open on this instance.
  pub fn in_transaction(&self) -> bool {
    self.txn.is_some()
  }

  /// Key of the open transaction, if any.
  pub fn transaction_key(&self) -> Option<&str> {
    self.txn.as_ref().map(|t| t.key.as_str())
  }

  /// Stage one field across many rows at once: for each index i,
  /// `staged[row_ids[i]][field] = values[i]`. The two sequences must be the
  /// same length. A missing row is created; a row holding a non-mapping
  /// errors and nothing is applied.
  pub fn update_column(
    &mut self,
    row_ids: &[String],
    field: &str,
    values: Vec<Value>,
  ) -> Result<(), CacheError> {
    let txn = self.txn.as_mut().ok_or(CacheError::NoTransaction)?;
    if row_ids.len() != values.len() {
      return Err(CacheError::LengthMismatch {
        rows: row_ids.len(),
        values: values.len(),
      });
    }

    for row_id in row_ids {
      if let Some(slot) = txn.staged.get(row_id) {
        if !slot.is_map() {
          return Err(CacheError::NotAnAggregate {
            key: format!("{}[{}]", txn.key, row_id),
          });
        }
      }
    }

    for (row_id, value) in row_ids.iter().zip(values) {
      let slot = txn
        .staged
        .entry(row_id.clone())
        .or_insert_with(|| Value::Map(BTreeMap::new()));
      if let Value::Map(row) = slot {
        row.insert(field.to_string(), value);
      }
    }
    Ok(())
  }

  /// Replace the whole row at `row_id` (full overwrite, not a merge).
  pub fn replace_row(&mut self, row_id: &str, value: Value) -> Result<(), CacheError> {
    let txn = self.txn.as_mut().ok_or(CacheError::NoTransaction)?;
    txn.staged.insert(row_id.to_string(), value);
    Ok(())
  }

  /// Apply `fields` to one row (`Some(id)`) or to the aggregate itself
  /// (`None`). Every named field must already exist in the target, and
  /// increments require the current value to be numeric. All-or-nothing:
  /// the whole call is validated first and nothing is applied on error.
  pub fn update_row(
    &mut self,
    row: Option<&str>,
    fields: &BTreeMap<String, FieldOp>,
  ) -> Result<(), CacheError> {
    let txn = self.txn.as_mut().ok_or(CacheError::NoTransaction)?;
    let key = txn.key.clone();

    let target = match row {
      None => &mut txn.staged,
      Some(row_id) => match txn.staged.get_mut(row_id) {
        Some(Value::Map(row)) => row,
        _ => {
          return Err(CacheError::FieldNotFound {
            field: row_id.to_string(),
            key,
          })
        }
      },
    };

    for (field, op) in fields {
      let current = target.get(field).ok_or_else(|| CacheError::FieldNotFound {
        field: field.clone(),
        key: key.clone(),
      })?;
      let is_delta = matches!(op, FieldOp::Increment(_) | FieldOp::Decrement(_));
      if is_delta && !current.is_numeric() {
        return Err(CacheError::NonNumericDelta {
          field: field.clone(),
          key: key.clone(),
        });
      }
    }

    for (field, op) in fields {
      if let Some(slot) = target.get_mut(field) {
        match op {
          FieldOp::Set(value) => *slot = value.clone(),
          FieldOp::Increment(delta) => bump(slot, *delta),
          FieldOp::Decrement(delta) => bump(slot, -*delta),
        }
      }
    }
    Ok(())
  }

  /// Write the staged aggregate back under `ttl` and close the transaction.
  ///
  /// The transition to idle happens even when the write fails: a failed
  /// commit is fatal to the aggregate and leaves no pending state behind.
  pub async fn commit(&mut self, ttl: Option<u64>) -> Result<(), CacheError> {
    let txn = self.txn.take().ok_or(CacheError::NoTransaction)?;
    let staged = Value::Map(txn.staged);
    self.set(&txn.key, &staged, ttl).await?;
    tracing::debug!("committed aggregate {}", txn.key);
    Ok(())
  }

  /// Discard any staged state. Idempotent; never touches the backend, so it
  /// succeeds even when the connection is unresponsive.
  pub fn cancel(&mut self) {
    self.txn = None;
  }
}

fn bump(slot: &mut Value, delta: i64) {
  match slot {
    Value::Int(i) => *i += delta,
    Value::Float(f) => *f += delta as f64,
    _ => {}
  }
}
