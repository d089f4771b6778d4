//! Backend client with transparent caching.

use serde::{de::DeserializeOwned, Serialize};

use crate::cache::{CacheLayer, KeyValueStore, RemoteSource};
use crate::query::CachedQuery;

use super::app_config::{reduce_config_rows, AppConfig};
use super::resources::Resource;
use super::types::{Area, Celebration, City, Festival, Utility};

/// Hands out one independent query per consumer for each catalogue resource.
///
/// Every query fetches from the remote source, persists what it got, and
/// falls back to the persisted copy when the remote source fails.
pub struct CachedBackend<S, R> {
  cache: CacheLayer<S, R>,
}

impl<S: KeyValueStore + 'static, R: RemoteSource> CachedBackend<S, R> {
  pub fn new(cache: CacheLayer<S, R>) -> Self {
    Self { cache }
  }

  #[allow(dead_code)]
  pub fn cache(&self) -> &CacheLayer<S, R> {
    &self.cache
  }

  pub fn festivals(&self) -> CachedQuery<Vec<Festival>> {
    self.list(Resource::Festivals)
  }

  pub fn festival_details(&self) -> CachedQuery<Vec<Festival>> {
    self.list(Resource::FestivalDetails)
  }

  pub fn cities(&self) -> CachedQuery<Vec<City>> {
    self.list(Resource::Cities)
  }

  pub fn utilities(&self) -> CachedQuery<Vec<Utility>> {
    self.list(Resource::Utilities)
  }

  pub fn areas(&self, city_id: i64) -> CachedQuery<Vec<Area>> {
    self.list(Resource::Areas { city_id })
  }

  pub fn celebrations(&self, area_id: i64) -> CachedQuery<Vec<Celebration>> {
    self.list(Resource::Celebrations { area_id })
  }

  /// The app configuration mapping, with the same fallback rules as lists.
  pub fn app_config(&self) -> CachedQuery<AppConfig> {
    let cache = self.cache.clone();
    let request = Resource::AppConfig.request();
    CachedQuery::new(move || {
      let cache = cache.clone();
      let request = request.clone();
      async move { cache.fetch_with(&request, reduce_config_rows).await }
    })
  }

  /// Any list resource, decoded as `T`.
  pub fn list<T>(&self, resource: Resource) -> CachedQuery<Vec<T>>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
  {
    let cache = self.cache.clone();
    let request = resource.request();
    CachedQuery::new(move || {
      let cache = cache.clone();
      let request = request.clone();
      async move { cache.fetch_list::<T>(&request).await }
    })
  }
}

impl<S, R> Clone for CachedBackend<S, R> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{save_json, CacheLookup, RemoteError, SqliteStorage};
  use crate::query::{QueryPhase, QueryResult};
  use crate::testing::{PanickingRemote, ScriptedRemote};
  use serde_json::json;
  use std::sync::Arc;

  fn backend() -> (Arc<ScriptedRemote>, CachedBackend<SqliteStorage, ScriptedRemote>) {
    let remote = Arc::new(ScriptedRemote::new());
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let cache = CacheLayer::new(storage, Arc::clone(&remote));
    (remote, CachedBackend::new(cache))
  }

  fn durga_puja() -> Festival {
    serde_json::from_value(json!({ "id": 1, "name": "Durga Puja" })).unwrap()
  }

  #[tokio::test]
  async fn test_festivals_fresh() {
    let (remote, backend) = backend();
    remote.push_rows(json!([{ "id": 1, "name": "Durga Puja" }]));

    let mut festivals = backend.festivals();
    festivals.load();
    festivals.settle().await;

    assert_eq!(
      festivals.state(),
      &QueryResult {
        data: vec![durga_puja()],
        loading: false,
        is_offline: false,
        error: None,
      }
    );
    assert_eq!(
      backend.cache().cached::<Vec<Festival>>("festivals_cache"),
      CacheLookup::Hit(vec![durga_puja()])
    );
    assert_eq!(
      remote.requests()[0],
      (
        "ParikramaFestivals".to_string(),
        "id,name,subtitle,description,when_to_go,city_name,images,start_date,end_date".to_string()
      )
    );
  }

  #[tokio::test]
  async fn test_festivals_offline_from_cache() {
    let (remote, backend) = backend();
    remote.push_error(RemoteError::Request("network error".to_string()));
    save_json(
      backend.cache().storage().as_ref(),
      "festivals_cache",
      &json!([{ "id": 1, "name": "Durga Puja" }]),
    )
    .unwrap();

    let mut festivals = backend.festivals();
    festivals.load();
    festivals.settle().await;

    assert_eq!(festivals.phase(), QueryPhase::Stale);
    assert_eq!(festivals.data(), &vec![durga_puja()]);
    assert!(festivals.is_offline());
    assert!(festivals.error().is_none());
  }

  #[tokio::test]
  async fn test_festivals_without_cache() {
    let (remote, backend) = backend();
    let error = RemoteError::Request("network error".to_string());
    remote.push_error(error.clone());

    let mut festivals = backend.festivals();
    festivals.load();
    festivals.settle().await;

    assert!(festivals.data().is_empty());
    assert!(!festivals.is_offline());
    assert_eq!(festivals.error(), Some(&error));
  }

  #[tokio::test]
  async fn test_festivals_offline_when_remote_panics() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    save_json(storage.as_ref(), "festivals_cache", &json!([{ "id": 1, "name": "Durga Puja" }]))
      .unwrap();
    let backend = CachedBackend::new(CacheLayer::new(storage, Arc::new(PanickingRemote)));

    let mut festivals = backend.festivals();
    festivals.load();
    festivals.settle().await;

    assert_eq!(festivals.phase(), QueryPhase::Stale);
    assert!(festivals.is_offline());
    assert_eq!(festivals.data(), &vec![durga_puja()]);
    assert!(festivals.error().is_none());
  }

  #[tokio::test]
  async fn test_app_config_resolves_and_persists_mapping() {
    let (remote, backend) = backend();
    remote.push_rows(json!([
      { "config_name": "aboutTitle", "config_value": "About Parikrama" }
    ]));
    remote.push_error(RemoteError::Request("offline".to_string()));

    let mut config = backend.app_config();
    config.load();
    config.settle().await;

    assert_eq!(config.data().get("aboutTitle"), Some("About Parikrama"));
    assert_eq!(config.data().get_or("missingKey", "default"), "default");
    // The mapping is stored, not the rows
    assert_eq!(
      backend.cache().cached::<serde_json::Value>("parikrama_config"),
      CacheLookup::Hit(json!({ "aboutTitle": "About Parikrama" }))
    );

    config.refresh();
    config.settle().await;
    assert!(config.is_offline());
    assert_eq!(config.data().get("aboutTitle"), Some("About Parikrama"));
  }

  #[tokio::test]
  async fn test_each_consumer_fetches_independently() {
    let (remote, backend) = backend();
    remote.push_rows(json!([{ "id": 1, "city": "Kolkata" }]));
    remote.push_rows(json!([{ "id": 1, "city": "Kolkata" }]));

    let mut header = backend.cities();
    let mut selector = backend.cities();
    header.load();
    selector.load();
    header.settle().await;
    selector.settle().await;

    assert_eq!(remote.calls(), 2);
    assert_eq!(header.data(), selector.data());
  }

  #[tokio::test]
  async fn test_scoped_resources_use_their_own_slots() {
    let (remote, backend) = backend();
    remote.push_rows(json!([{ "id": 5, "city_id": 1, "area": "North" }]));
    remote.push_error(RemoteError::NoData);

    let mut kolkata = backend.areas(1);
    kolkata.load();
    kolkata.settle().await;

    let mut delhi = backend.areas(2);
    delhi.load();
    delhi.settle().await;

    assert_eq!(kolkata.data().len(), 1);
    assert_eq!(delhi.phase(), QueryPhase::Empty);
  }
}
