//! Cache layer that orchestrates remote fetching with local fallback.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::error::{RemoteError, StoreError};
use super::traits::{save_json, CacheLookup, CacheMiss, FetchOutcome, KeyValueStore};

/// A loosely-typed row as returned by the remote service.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A remote service that can read a table-like resource.
pub trait RemoteSource: Send + Sync + 'static {
  /// Read every row of `resource`, restricted to the comma-separated
  /// `select` list (`*` for all fields).
  ///
  /// `Ok(None)` means the service answered without a payload.
  fn fetch(
    &self,
    resource: &str,
    select: &str,
  ) -> impl Future<Output = Result<Option<Vec<Record>>, RemoteError>> + Send;
}

/// What to fetch and where to keep the local copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
  /// Storage slot for the last good payload
  pub cache_key: String,
  /// Remote table name
  pub resource: String,
  /// Field allow-list; `None` selects all fields
  pub select: Option<String>,
}

impl QueryRequest {
  pub fn new(cache_key: impl Into<String>, resource: impl Into<String>) -> Self {
    Self {
      cache_key: cache_key.into(),
      resource: resource.into(),
      select: None,
    }
  }

  pub fn with_select(mut self, select: impl Into<String>) -> Self {
    self.select = Some(select.into());
    self
  }

  pub fn select(&self) -> &str {
    self.select.as_deref().unwrap_or("*")
  }
}

type RowsResult = Result<Arc<Vec<Record>>, RemoteError>;
type SharedFetch = Shared<BoxFuture<'static, RowsResult>>;
type InFlight = Arc<Mutex<HashMap<String, SharedFetch>>>;
type StoreErrorHook = Arc<dyn Fn(&str, &StoreError) + Send + Sync>;

/// Cache layer that asks the remote source first and falls back to the
/// last persisted payload when that fails.
pub struct CacheLayer<S, R> {
  storage: Arc<S>,
  remote: Arc<R>,
  /// Upper bound on a single remote call; `None` waits forever
  timeout: Option<Duration>,
  /// Present when concurrent loads of one key share a single remote call
  in_flight: Option<InFlight>,
  on_store_error: Option<StoreErrorHook>,
}

impl<S: KeyValueStore + 'static, R: RemoteSource> CacheLayer<S, R> {
  pub fn new(storage: Arc<S>, remote: Arc<R>) -> Self {
    Self {
      storage,
      remote,
      timeout: None,
      in_flight: None,
      on_store_error: None,
    }
  }

  /// Bound each remote call by `timeout`.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Collapse concurrent loads of the same cache key into one remote call
  /// and one cache write.
  pub fn with_request_dedup(mut self, enabled: bool) -> Self {
    self.in_flight = enabled.then(|| Arc::new(Mutex::new(HashMap::new())));
    self
  }

  /// Called whenever persisting a fresh payload fails.
  pub fn with_store_error_hook<F>(mut self, hook: F) -> Self
  where
    F: Fn(&str, &StoreError) + Send + Sync + 'static,
  {
    self.on_store_error = Some(Arc::new(hook));
    self
  }

  #[allow(dead_code)]
  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  /// Fetch a collection, decoding every row as `T`.
  pub async fn fetch_list<T>(&self, request: &QueryRequest) -> FetchOutcome<Vec<T>>
  where
    T: Serialize + DeserializeOwned,
  {
    self.fetch_with(request, decode_rows::<T>).await
  }

  /// Fetch rows and turn them into the payload with `reduce`.
  ///
  /// 1. Ask the remote source
  /// 2. On success, persist the payload under the cache key and return it
  /// 3. On failure (including an empty response or a `reduce` error),
  ///    serve the persisted payload as offline data if there is one
  pub async fn fetch_with<P, F>(&self, request: &QueryRequest, reduce: F) -> FetchOutcome<P>
  where
    P: Serialize + DeserializeOwned,
    F: FnOnce(&[Record]) -> Result<P, RemoteError>,
  {
    let key = request.cache_key.as_str();
    let (rows, leader) = self.fetch_rows(request).await;

    let failure = match rows.and_then(|rows| reduce(rows.as_slice())) {
      Ok(payload) => {
        if leader {
          self.persist(key, &payload);
        }
        return FetchOutcome::Fresh(payload);
      }
      Err(e) => e,
    };

    tracing::warn!(
      cache_key = key,
      resource = %request.resource,
      error = %failure,
      "remote fetch failed, falling back to local copy"
    );

    match self.cached::<P>(key) {
      CacheLookup::Hit(payload) => FetchOutcome::Stale(payload),
      CacheLookup::Miss => FetchOutcome::Empty {
        error: failure,
        cache: CacheMiss::Missing,
      },
      CacheLookup::Corrupt(parse_error) => {
        tracing::warn!(cache_key = key, error = %parse_error, "local copy does not parse");
        FetchOutcome::Empty {
          error: failure,
          cache: CacheMiss::Corrupt(parse_error),
        }
      }
    }
  }

  /// Read the persisted payload for `key` without touching the network.
  pub fn cached<P: DeserializeOwned>(&self, key: &str) -> CacheLookup<P> {
    CacheLookup::from_raw(self.storage.get(key))
  }

  /// Run the remote call, joining an in-flight one for the same key when
  /// dedup is on. The flag is true for the caller that owns the cache write.
  async fn fetch_rows(&self, request: &QueryRequest) -> (RowsResult, bool) {
    let Some(in_flight) = &self.in_flight else {
      return (self.remote_call(request).await, true);
    };

    let (shared, guard) = {
      let mut map = lock(in_flight);
      match map.get(&request.cache_key) {
        Some(existing) => {
          tracing::debug!(cache_key = %request.cache_key, "joining in-flight request");
          (existing.clone(), None)
        }
        None => {
          let shared = self.remote_call(request).shared();
          map.insert(request.cache_key.clone(), shared.clone());
          let guard = InFlightGuard {
            in_flight: Arc::clone(in_flight),
            key: request.cache_key.clone(),
          };
          (shared, Some(guard))
        }
      }
    };

    let result = shared.await;
    (result, guard.is_some())
  }

  fn remote_call(&self, request: &QueryRequest) -> BoxFuture<'static, RowsResult> {
    let remote = Arc::clone(&self.remote);
    let resource = request.resource.clone();
    let select = request.select().to_string();
    let timeout = self.timeout;

    async move {
      tracing::debug!(%resource, %select, "fetching from remote");
      // A panicking remote source is a failed read, not a lost fetch
      let call = async {
        AssertUnwindSafe(async { remote.fetch(&resource, &select).await })
          .catch_unwind()
          .await
          .unwrap_or_else(|panic| Err(RemoteError::Request(panic_message(panic))))
      };
      let response = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
          .await
          .unwrap_or(Err(RemoteError::Timeout(limit))),
        None => call.await,
      };

      match response? {
        Some(rows) => Ok(Arc::new(rows)),
        None => Err(RemoteError::NoData),
      }
    }
    .boxed()
  }

  fn persist<P: Serialize>(&self, key: &str, payload: &P) {
    match save_json(self.storage.as_ref(), key, payload) {
      Ok(()) => tracing::debug!(cache_key = key, "persisted fresh payload"),
      Err(e) => {
        tracing::warn!(cache_key = key, error = %e, "failed to persist fresh payload");
        if let Some(hook) = &self.on_store_error {
          hook(key, &e);
        }
      }
    }
  }
}

impl<S, R> Clone for CacheLayer<S, R> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      remote: Arc::clone(&self.remote),
      timeout: self.timeout,
      in_flight: self.in_flight.clone(),
      on_store_error: self.on_store_error.clone(),
    }
  }
}

/// Removes the in-flight entry once its owner is done with it.
struct InFlightGuard {
  in_flight: InFlight,
  key: String,
}

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    lock(&self.in_flight).remove(&self.key);
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
  let detail = panic
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| panic.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "unknown cause".to_string());
  format!("remote source panicked: {}", detail)
}

/// Decode each row as `T`.
fn decode_rows<T: DeserializeOwned>(rows: &[Record]) -> Result<Vec<T>, RemoteError> {
  rows
    .iter()
    .map(|row| serde_json::from_value(serde_json::Value::Object(row.clone())))
    .collect::<Result<Vec<T>, _>>()
    .map_err(|e| RemoteError::Decode(e.to_string()))
}
