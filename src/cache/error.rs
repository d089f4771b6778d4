//! Error types for the remote source and the local store.

use std::time::Duration;

/// Why a remote read did not produce a usable payload.
///
/// Cloneable so that one failure can be handed to every subscriber sharing a
/// request and kept in query state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
  /// Transport-level failure (DNS, TLS, connection reset, ...)
  #[error("request failed: {0}")]
  Request(String),
  /// The service answered with a non-success status
  #[error("service returned status {status}: {message}")]
  Status { status: u16, message: String },
  /// The service answered successfully but without a payload
  #[error("no data")]
  NoData,
  /// The payload could not be turned into the expected rows
  #[error("failed to decode response: {0}")]
  Decode(String),
  /// No answer within the configured timeout
  #[error("timed out after {0:?}")]
  Timeout(Duration),
  /// The fetch task ended without reporting a result
  #[error("query was cancelled")]
  Cancelled,
}

/// Failure of the local key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("storage backend error: {0}")]
  Backend(#[from] rusqlite::Error),
  #[error("failed to serialize value: {0}")]
  Serialize(#[from] serde_json::Error),
  #[error("store lock poisoned")]
  Poisoned,
  #[error("failed to open store at {path}: {message}")]
  Open { path: String, message: String },
}
