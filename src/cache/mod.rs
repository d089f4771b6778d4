//! Remote-first caching with offline fallback.
//!
//! This module is backend-agnostic:
//! - Persists the last good payload for each cache key in a key-value store
//! - Always asks the remote source first and falls back to the stored copy
//! - Reports whether data is fresh, stale (offline) or missing

mod error;
mod layer;
mod storage;
mod traits;

pub use error::{RemoteError, StoreError};
pub use layer::{CacheLayer, QueryRequest, Record, RemoteSource};
pub use storage::SqliteStorage;
pub use traits::{load_json, save_json, CacheLookup, CacheMiss, FetchOutcome, KeyValueStore};
