//! Remote app configuration: `config_name -> config_value` strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cache::{Record, RemoteError};

/// Resolved configuration mapping.
///
/// Absent keys are expected (optional settings); read them with a fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppConfig(BTreeMap<String, String>);

impl AppConfig {
  pub fn get(&self, key: &str) -> Option<&str> {
    self.0.get(key).map(String::as_str)
  }

  pub fn get_or<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
    self.get(key).unwrap_or(fallback)
  }

  #[allow(dead_code)]
  pub fn len(&self) -> usize {
    self.0.len()
  }

  #[allow(dead_code)]
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

impl FromIterator<(String, String)> for AppConfig {
  fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

#[derive(Debug, Deserialize)]
struct ConfigRow {
  config_name: String,
  config_value: Option<String>,
}

/// Reduce configuration rows to a mapping. Later rows win on duplicate names;
/// rows without a value are left out.
pub fn reduce_config_rows(rows: &[Record]) -> Result<AppConfig, RemoteError> {
  rows
    .iter()
    .map(|row| {
      serde_json::from_value::<ConfigRow>(serde_json::Value::Object(row.clone()))
        .map_err(|e| RemoteError::Decode(e.to_string()))
    })
    .filter_map(|row| match row {
      Ok(ConfigRow {
        config_name,
        config_value: Some(value),
      }) => Some(Ok((config_name, value))),
      Ok(_) => None,
      Err(e) => Some(Err(e)),
    })
    .collect()
}
