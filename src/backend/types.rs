//! Rows of the catalogue tables.
//!
//! Columns outside a query's select list are absent from the row, so every
//! column other than the id is optional or defaulted.

use serde::{Deserialize, Serialize};

/// Festival, as listed on the home screen and shown in detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Festival {
  pub id: i64,
  #[serde(default)]
  pub name: String,
  pub subtitle: Option<String>,
  pub description: Option<String>,
  pub when_to_go: Option<String>,
  pub tips: Option<String>,
  pub what_to_wear: Option<String>,
  /// Image URLs separated by `;`
  pub images: Option<String>,
  pub city_id: Option<i64>,
  pub city_name: Option<String>,
  pub start_date: Option<String>,
  pub end_date: Option<String>,
}

impl Festival {
  pub fn image_urls(&self) -> Vec<&str> {
    self
      .images
      .as_deref()
      .map(|images| {
        images
          .split(';')
          .map(str::trim)
          .filter(|url| !url.is_empty())
          .collect()
      })
      .unwrap_or_default()
  }
}

/// City the catalogue covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
  pub id: i64,
  pub city: String,
  pub state: Option<String>,
  pub country: Option<String>,
}

/// Neighbourhood of a city with its own celebrations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
  pub id: i64,
  pub city_id: Option<i64>,
  #[serde(default)]
  pub area: String,
}

/// A place where a festival is celebrated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Celebration {
  pub id: i64,
  #[serde(default)]
  pub name: String,
  pub address: Option<String>,
  #[serde(rename = "metroStation")]
  pub metro_station: Option<String>,
  #[serde(rename = "distanceFromMetro")]
  pub distance_from_metro: Option<String>,
  pub description: Option<String>,
  pub city_id: Option<i64>,
  pub city_name: Option<String>,
  pub festival_id: Option<i64>,
  pub festival_name: Option<String>,
  pub area_id: Option<i64>,
  pub area_name: Option<String>,
}

/// Useful location (ATM, hospital, police station, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utility {
  pub id: i64,
  #[serde(default)]
  pub name: String,
  /// Search string for a maps application
  pub map_query: Option<String>,
  pub image: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_festival_from_partial_row() {
    let festival: Festival =
      serde_json::from_value(json!({ "id": 1, "name": "Durga Puja", "city_name": "Kolkata" }))
        .unwrap();
    assert_eq!(festival.name, "Durga Puja");
    assert_eq!(festival.city_name.as_deref(), Some("Kolkata"));
    assert!(festival.tips.is_none());
  }

  #[test]
  fn test_image_urls() {
    let festival: Festival = serde_json::from_value(json!({
      "id": 1,
      "images": "https://a.example/1.jpg; https://a.example/2.jpg;"
    }))
    .unwrap();
    assert_eq!(
      festival.image_urls(),
      vec!["https://a.example/1.jpg", "https://a.example/2.jpg"]
    );
  }

  #[test]
  fn test_celebration_column_names() {
    let celebration: Celebration = serde_json::from_value(json!({
      "id": 7,
      "name": "College Square",
      "metroStation": "Central",
      "distanceFromMetro": "500 m",
      "area_id": 3
    }))
    .unwrap();
    assert_eq!(celebration.metro_station.as_deref(), Some("Central"));
    assert_eq!(celebration.distance_from_metro.as_deref(), Some("500 m"));
    assert_eq!(celebration.area_id, Some(3));
  }
}
