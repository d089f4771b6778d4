use std::sync::Arc;

use crate::backend::app_config::AppConfig;
use crate::cache::{KeyValueStore, StoreError};

const SLIDE_COUNT: usize = 4;
const DEFAULT_VERSION: &str = "1";

/// One onboarding slide, driven by app configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
  pub title: String,
  pub text: String,
  pub image: Option<String>,
}

/// Onboarding version; bumping it remotely shows onboarding again.
pub fn version(config: &AppConfig) -> &str {
  config.get_or("onboarding_version", DEFAULT_VERSION)
}

pub fn seen_key(version: &str) -> String {
  format!("onboardingSeen_v{}", version)
}

pub fn slides(config: &AppConfig) -> Vec<Slide> {
  (1..=SLIDE_COUNT)
    .map(|n| Slide {
      title: config
        .get(&format!("onboarding_slide_{}_title", n))
        .map(String::from)
        .unwrap_or_else(|| format!("Slide {}", n)),
      text: config
        .get(&format!("onboarding_slide_{}_text", n))
        .map(String::from)
        .unwrap_or_else(|| format!("Description for slide {}", n)),
      image: config
        .get(&format!("onboarding_slide_{}_image", n))
        .map(String::from),
    })
    .collect()
}

/// Local "has seen onboarding" flag.
pub struct Onboarding<S> {
  storage: Arc<S>,
}

impl<S: KeyValueStore> Onboarding<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  /// Unreadable storage counts as not seen.
  pub fn is_seen(&self, version: &str) -> bool {
    self.storage.get(&seen_key(version)).as_deref() == Some("true")
  }

  pub fn mark_seen(&self, version: &str) -> Result<(), StoreError> {
    self.storage.set(&seen_key(version), "true")
  }
}
