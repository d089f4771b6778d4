//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;

use crate::cache::{KeyValueStore, Record, RemoteError, RemoteSource, SqliteStorage, StoreError};

type Response = Result<Option<Vec<Record>>, RemoteError>;

/// Remote source that replays queued responses in order.
pub struct ScriptedRemote {
  responses: Mutex<VecDeque<Response>>,
  requests: Mutex<Vec<(String, String)>>,
  calls: AtomicUsize,
  delay: Duration,
}

impl ScriptedRemote {
  pub fn new() -> Self {
    Self {
      responses: Mutex::new(VecDeque::new()),
      requests: Mutex::new(Vec::new()),
      calls: AtomicUsize::new(0),
      delay: Duration::ZERO,
    }
  }

  /// Delay every response by `delay`.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// Queue a successful response. `rows` must be a JSON array of objects.
  pub fn push_rows(&self, rows: Value) {
    self.responses.lock().unwrap().push_back(Ok(Some(records(rows))));
  }

  /// Queue a successful response that carries no payload.
  pub fn push_null(&self) {
    self.responses.lock().unwrap().push_back(Ok(None));
  }

  pub fn push_error(&self, error: RemoteError) {
    self.responses.lock().unwrap().push_back(Err(error));
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  /// Every `(resource, select)` pair requested so far.
  pub fn requests(&self) -> Vec<(String, String)> {
    self.requests.lock().unwrap().clone()
  }
}

impl RemoteSource for ScriptedRemote {
  fn fetch(&self, resource: &str, select: &str) -> impl Future<Output = Response> + Send {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .requests
      .lock()
      .unwrap()
      .push((resource.to_string(), select.to_string()));
    let response = self
      .responses
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Err(RemoteError::Request("no scripted response".to_string())));
    let delay = self.delay;

    async move {
      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }
      response
    }
  }
}

/// Remote source whose every read panics mid-request.
pub struct PanickingRemote;

impl RemoteSource for PanickingRemote {
  fn fetch(&self, resource: &str, _select: &str) -> impl Future<Output = Response> + Send {
    let resource = resource.to_string();
    async move {
      tokio::task::yield_now().await;
      if !resource.is_empty() {
        panic!("malformed response for {}", resource);
      }
      Err(RemoteError::NoData)
    }
  }
}

/// Store whose reads work but whose writes always fail.
pub struct FailingWrites {
  inner: SqliteStorage,
}

impl FailingWrites {
  pub fn new() -> Self {
    Self {
      inner: SqliteStorage::open_in_memory().unwrap(),
    }
  }
}

impl KeyValueStore for FailingWrites {
  fn try_get(&self, key: &str) -> Result<Option<String>, StoreError> {
    self.inner.try_get(key)
  }

  fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
    Err(StoreError::Poisoned)
  }

  fn remove(&self, _key: &str) -> Result<(), StoreError> {
    Err(StoreError::Poisoned)
  }
}

/// Store where every operation fails.
pub struct BrokenStore;

impl KeyValueStore for BrokenStore {
  fn try_get(&self, _key: &str) -> Result<Option<String>, StoreError> {
    Err(StoreError::Poisoned)
  }

  fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
    Err(StoreError::Poisoned)
  }

  fn remove(&self, _key: &str) -> Result<(), StoreError> {
    Err(StoreError::Poisoned)
  }
}

/// Convert a JSON array of objects into rows.
pub fn records(rows: Value) -> Vec<Record> {
  match rows {
    Value::Array(items) => items
      .into_iter()
      .map(|item| match item {
        Value::Object(map) => map,
        other => panic!("expected an object row, got {}", other),
      })
      .collect(),
    other => panic!("expected an array of rows, got {}", other),
  }
}
