//! Per-subscriber query state over the cache layer.
//!
//! Inspired by TanStack Query, a `CachedQuery<T>` owns the state one consumer
//! renders from: the data, a loading flag, an offline flag and the error of
//! the last failed fetch. Each query runs its own fetches; nothing is shared
//! between two queries for the same cache key unless the cache layer dedups.
//!
//! # Example
//!
//! ```ignore
//! let mut festivals = backend.festivals();
//! festivals.load();
//!
//! // In event loop tick
//! if festivals.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! let state = festivals.state();
//! if state.is_offline {
//!     render_offline_banner();
//! }
//! render_list(&state.data);
//! ```

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use tokio::sync::mpsc;

use crate::cache::{FetchOutcome, RemoteError};

/// What a consumer renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
  pub data: T,
  pub loading: bool,
  pub is_offline: bool,
  pub error: Option<RemoteError>,
}

impl<T: Default> Default for QueryResult<T> {
  fn default() -> Self {
    Self {
      data: T::default(),
      loading: false,
      is_offline: false,
      error: None,
    }
  }
}

/// Where a query is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
  /// Not started
  Idle,
  /// A fetch is running
  Fetching,
  /// Showing data from the remote service
  Fresh,
  /// Showing persisted data because the remote fetch failed
  Stale,
  /// Remote fetch failed and nothing was persisted
  Empty,
}

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<'static, FetchOutcome<T>> + Send + Sync>;

/// A single consumer's view of a cached remote resource.
///
/// Dropping the query is the consumer going away: a fetch that is still
/// running completes (including its cache write) but its result is discarded.
pub struct CachedQuery<T> {
  state: QueryResult<T>,
  phase: QueryPhase,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<FetchOutcome<T>>>,
}

impl<T: Default + Send + 'static> CachedQuery<T> {
  /// Create a query around `fetcher`, which is called once per `load()` or
  /// `refresh()`.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchOutcome<T>> + Send + 'static,
  {
    Self {
      state: QueryResult::default(),
      phase: QueryPhase::Idle,
      fetcher: Box::new(move || fetcher().boxed()),
      receiver: None,
    }
  }

  #[allow(dead_code)]
  pub fn state(&self) -> &QueryResult<T> {
    &self.state
  }

  #[allow(dead_code)]
  pub fn phase(&self) -> QueryPhase {
    self.phase
  }

  pub fn data(&self) -> &T {
    &self.state.data
  }

  #[allow(dead_code)]
  pub fn is_loading(&self) -> bool {
    self.state.loading
  }

  pub fn is_offline(&self) -> bool {
    self.state.is_offline
  }

  pub fn error(&self) -> Option<&RemoteError> {
    self.state.error.as_ref()
  }

  /// Start the initial fetch. No-op while a fetch is running.
  pub fn load(&mut self) {
    if self.state.loading {
      return;
    }
    self.start_fetch();
  }

  /// Fetch again. A result still pending from an earlier fetch is discarded,
  /// so results are applied in request order.
  pub fn refresh(&mut self) {
    self.receiver = None;
    self.start_fetch();
  }

  /// Apply a finished fetch without blocking.
  ///
  /// Returns `true` if the state changed. Call this on every tick.
  #[allow(dead_code)]
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(outcome) => {
        self.apply(outcome);
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.apply_cancelled();
        true
      }
    }
  }

  /// Wait for the running fetch to finish and apply it.
  ///
  /// Returns `false` if no fetch was running.
  pub async fn settle(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.recv().await {
      Some(outcome) => self.apply(outcome),
      None => self.apply_cancelled(),
    }
    true
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.phase = QueryPhase::Fetching;
    // Previous data stays visible until the new result replaces it
    self.state.loading = true;
    self.state.error = None;

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let outcome = future.await;
      // Ignore send errors - the consumer may have gone away
      let _ = tx.send(outcome);
    });
  }

  fn apply(&mut self, outcome: FetchOutcome<T>) {
    self.receiver = None;
    let (phase, state) = match outcome {
      FetchOutcome::Fresh(data) => (
        QueryPhase::Fresh,
        QueryResult {
          data,
          loading: false,
          is_offline: false,
          error: None,
        },
      ),
      FetchOutcome::Stale(data) => (
        QueryPhase::Stale,
        QueryResult {
          data,
          loading: false,
          is_offline: true,
          error: None,
        },
      ),
      FetchOutcome::Empty { error, .. } => (
        QueryPhase::Empty,
        QueryResult {
          data: T::default(),
          loading: false,
          is_offline: false,
          error: Some(error),
        },
      ),
    };
    self.phase = phase;
    self.state = state;
  }

  fn apply_cancelled(&mut self) {
    self.receiver = None;
    self.phase = QueryPhase::Empty;
    self.state = QueryResult {
      data: T::default(),
      loading: false,
      is_offline: false,
      error: Some(RemoteError::Cancelled),
    };
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for CachedQuery<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CachedQuery")
      .field("state", &self.state)
      .field("phase", &self.phase)
      .finish_non_exhaustive()
  }
}
