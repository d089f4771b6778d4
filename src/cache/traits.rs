//! Core traits and types for the caching system.

use serde::{de::DeserializeOwned, Serialize};

use super::error::{RemoteError, StoreError};

/// A durable string-keyed store.
///
/// Reads are best-effort: `get` folds storage faults into "absent". Writes
/// report their outcome so callers can decide whether to act on it.
pub trait KeyValueStore: Send + Sync {
  /// Read a value, surfacing storage faults.
  fn try_get(&self, key: &str) -> Result<Option<String>, StoreError>;

  /// Overwrite the value stored under `key`.
  fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

  /// Remove `key`. Removing an absent key is not an error.
  fn remove(&self, key: &str) -> Result<(), StoreError>;

  /// Read a value. A missing key and a storage fault both yield `None`.
  fn get(&self, key: &str) -> Option<String> {
    match self.try_get(key) {
      Ok(value) => value,
      Err(e) => {
        tracing::warn!(key, error = %e, "store read failed, treating as absent");
        None
      }
    }
  }
}

/// Outcome of reading a cached payload back from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
  /// A payload exists and parsed
  Hit(T),
  /// Nothing stored under the key
  Miss,
  /// Something is stored but does not parse as `T`
  Corrupt(String),
}

impl<T: DeserializeOwned> CacheLookup<T> {
  /// Parse a raw stored value.
  pub fn from_raw(raw: Option<String>) -> Self {
    match raw {
      None => CacheLookup::Miss,
      Some(raw) => match serde_json::from_str(&raw) {
        Ok(payload) => CacheLookup::Hit(payload),
        Err(e) => CacheLookup::Corrupt(e.to_string()),
      },
    }
  }
}

/// Why a failed fetch produced no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMiss {
  Missing,
  Corrupt(String),
}

/// Terminal result of one remote-then-fallback fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
  /// Fresh data from the remote service
  Fresh(T),
  /// Remote failed, serving the last persisted payload
  Stale(T),
  /// Remote failed and there was nothing usable to fall back to
  Empty { error: RemoteError, cache: CacheMiss },
}

#[allow(dead_code)]
impl<T> FetchOutcome<T> {
  pub fn data(&self) -> Option<&T> {
    match self {
      FetchOutcome::Fresh(data) | FetchOutcome::Stale(data) => Some(data),
      FetchOutcome::Empty { .. } => None,
    }
  }

  pub fn is_offline(&self) -> bool {
    matches!(self, FetchOutcome::Stale(_))
  }

  pub fn error(&self) -> Option<&RemoteError> {
    match self {
      FetchOutcome::Empty { error, .. } => Some(error),
      _ => None,
    }
  }
}

/// Read `key` as JSON, returning `fallback` when absent or unparsable.
pub fn load_json<T, S>(store: &S, key: &str, fallback: T) -> T
where
  T: DeserializeOwned,
  S: KeyValueStore + ?Sized,
{
  match CacheLookup::from_raw(store.get(key)) {
    CacheLookup::Hit(value) => value,
    CacheLookup::Miss => fallback,
    CacheLookup::Corrupt(e) => {
      tracing::warn!(key, error = %e, "stored value does not parse, using fallback");
      fallback
    }
  }
}

/// Serialize `value` as JSON and store it under `key`.
pub fn save_json<T, S>(store: &S, key: &str, value: &T) -> Result<(), StoreError>
where
  T: Serialize + ?Sized,
  S: KeyValueStore + ?Sized,
{
  let raw = serde_json::to_string(value)?;
  store.set(key, &raw)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_lookup_distinguishes_miss_and_corrupt() {
    assert_eq!(CacheLookup::<Vec<u32>>::from_raw(None), CacheLookup::Miss);
    assert_eq!(
      CacheLookup::<Vec<u32>>::from_raw(Some("[1,2]".to_string())),
      CacheLookup::Hit(vec![1, 2])
    );
    assert!(matches!(
      CacheLookup::<Vec<u32>>::from_raw(Some("not json".to_string())),
      CacheLookup::Corrupt(_)
    ));
  }

  #[test]
  fn test_outcome_accessors() {
    let stale = FetchOutcome::Stale(vec![1]);
    assert!(stale.is_offline());
    assert_eq!(stale.data(), Some(&vec![1]));
    assert!(stale.error().is_none());

    let empty: FetchOutcome<Vec<u32>> = FetchOutcome::Empty {
      error: RemoteError::NoData,
      cache: CacheMiss::Missing,
    };
    assert!(!empty.is_offline());
    assert!(empty.data().is_none());
    assert_eq!(empty.error(), Some(&RemoteError::NoData));
  }
}
