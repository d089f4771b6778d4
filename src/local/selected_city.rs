use std::sync::{Arc, RwLock};

use crate::cache::KeyValueStore;

pub const SELECTED_CITY_KEY: &str = "parikrama_selected_city";

/// The city the user is browsing, shared by everything built from one
/// application context.
///
/// Persistence is best-effort: the in-memory value always follows `set`,
/// even if the store write fails.
pub struct SelectedCity<S> {
  storage: Arc<S>,
  current: Arc<RwLock<Option<String>>>,
}

impl<S: KeyValueStore> SelectedCity<S> {
  /// Restore the last selection from the store.
  pub fn restore(storage: Arc<S>) -> Self {
    let current = storage.get(SELECTED_CITY_KEY).filter(|city| !city.is_empty());
    Self {
      storage,
      current: Arc::new(RwLock::new(current)),
    }
  }

  pub fn get(&self) -> Option<String> {
    match self.current.read() {
      Ok(current) => current.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }

  /// Select `city`, or clear the selection with `None`.
  pub fn set(&self, city: Option<&str>) {
    let city = city.map(str::trim).filter(|c| !c.is_empty());

    let written = match city {
      Some(city) => self.storage.set(SELECTED_CITY_KEY, city),
      None => self.storage.remove(SELECTED_CITY_KEY),
    };
    if let Err(e) = written {
      tracing::warn!(error = %e, "failed to persist selected city");
    }

    let mut current = match self.current.write() {
      Ok(current) => current,
      Err(poisoned) => poisoned.into_inner(),
    };
    *current = city.map(String::from);
  }
}

impl<S> Clone for SelectedCity<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      current: Arc::clone(&self.current),
    }
  }
}
