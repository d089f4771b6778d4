//! Everything a command needs, built once at startup and passed down.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::backend::cached_client::CachedBackend;
use crate::backend::client::BackendClient;
use crate::cache::{CacheLayer, KeyValueStore, RemoteSource, SqliteStorage};
use crate::config::Config;
use crate::local::notes::Notebook;
use crate::local::onboarding::Onboarding;
use crate::local::selected_city::SelectedCity;

pub struct AppContext<S, R> {
  pub config: Config,
  pub backend: CachedBackend<S, R>,
  pub selected_city: SelectedCity<S>,
  storage: Arc<S>,
}

impl AppContext<SqliteStorage, BackendClient> {
  /// Open the local store and connect the backend client described by
  /// `config`.
  pub fn open(config: Config) -> Result<Self> {
    let storage = match &config.cache.path {
      Some(path) => SqliteStorage::open_at(path),
      None => SqliteStorage::open(),
    }
    .map_err(|e| eyre!("Failed to open local store: {}", e))?;
    let remote = BackendClient::new(&config)?;

    Ok(Self::new(config, Arc::new(storage), Arc::new(remote)))
  }
}

impl<S: KeyValueStore + 'static, R: RemoteSource> AppContext<S, R> {
  pub fn new(config: Config, storage: Arc<S>, remote: Arc<R>) -> Self {
    let cache = CacheLayer::new(Arc::clone(&storage), remote)
      .with_timeout(config.backend.timeout())
      .with_request_dedup(config.cache.dedupe_requests)
      .with_store_error_hook(|key, e| {
        tracing::error!(cache_key = key, error = %e, "local copy not updated");
      });

    Self {
      backend: CachedBackend::new(cache),
      selected_city: SelectedCity::restore(Arc::clone(&storage)),
      storage,
      config,
    }
  }

  pub fn notes(&self) -> Notebook<S> {
    Notebook::new(Arc::clone(&self.storage))
  }

  pub fn onboarding(&self) -> Onboarding<S> {
    Onboarding::new(Arc::clone(&self.storage))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::save_json;
  use serde_json::json;

  fn keyless_context() -> AppContext<SqliteStorage, BackendClient> {
    let config: Config =
      serde_yaml::from_str("backend:\n  url: https://example.supabase.co\n").unwrap();
    let remote = BackendClient::with_api_key(&config.backend.url, None).unwrap();
    let storage = SqliteStorage::open_in_memory().unwrap();
    AppContext::new(config, Arc::new(storage), Arc::new(remote))
  }

  #[tokio::test]
  async fn test_without_api_key_local_features_work() {
    let ctx = keyless_context();

    ctx.selected_city.set(Some("Kolkata"));
    assert_eq!(ctx.selected_city.get().as_deref(), Some("Kolkata"));
    ctx.notes().add("Pandals", "").unwrap();
    assert_eq!(ctx.notes().list().len(), 1);
  }

  #[tokio::test]
  async fn test_without_api_key_catalogue_serves_cached_copy() {
    let ctx = keyless_context();
    save_json(ctx.storage.as_ref(), "cities_cache", &json!([{ "id": 1, "city": "Kolkata" }]))
      .unwrap();

    let mut cities = ctx.backend.cities();
    cities.load();
    cities.settle().await;

    assert!(cities.is_offline());
    assert_eq!(cities.data()[0].city, "Kolkata");
  }
}
