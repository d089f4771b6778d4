//! Named catalogue queries and their cache keys.

use crate::cache::QueryRequest;

pub const FESTIVALS_TABLE: &str = "ParikramaFestivals";
pub const LOCATIONS_TABLE: &str = "ParikramaLocations";
pub const AREAS_TABLE: &str = "ParikramaAreas";
pub const CELEBRATIONS_TABLE: &str = "ParikramaCelebrations";
pub const UTILITIES_TABLE: &str = "ParikramaUtilities";
pub const CONFIG_TABLE: &str = "ParikramaConfig";

/// Cache slot of the resolved app configuration mapping
pub const CONFIG_CACHE_KEY: &str = "parikrama_config";

/// Every catalogue query the client issues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
  /// Festival list for the home screen
  Festivals,
  /// Festivals with the long-form detail columns
  FestivalDetails,
  /// Cities the catalogue covers
  Cities,
  /// Utility locations
  Utilities,
  /// Areas of one city
  Areas { city_id: i64 },
  /// Celebrations in one area
  Celebrations { area_id: i64 },
  /// Configuration rows
  AppConfig,
}

impl Resource {
  /// Storage slot for this query's last good payload.
  ///
  /// Two queries that select different columns never share a key.
  pub fn cache_key(&self) -> String {
    match self {
      Self::Festivals => "festivals_cache".to_string(),
      Self::FestivalDetails => "festival_details_cache".to_string(),
      Self::Cities => "cities_cache".to_string(),
      Self::Utilities => "utilities_cache".to_string(),
      Self::Areas { city_id } => format!("areas_cache_{}", city_id),
      Self::Celebrations { area_id } => format!("celebrations_cache_{}", area_id),
      Self::AppConfig => CONFIG_CACHE_KEY.to_string(),
    }
  }

  pub fn table(&self) -> &'static str {
    match self {
      Self::Festivals | Self::FestivalDetails => FESTIVALS_TABLE,
      Self::Cities => LOCATIONS_TABLE,
      Self::Utilities => UTILITIES_TABLE,
      Self::Areas { .. } => AREAS_TABLE,
      Self::Celebrations { .. } => CELEBRATIONS_TABLE,
      Self::AppConfig => CONFIG_TABLE,
    }
  }

  /// Column allow-list; `None` reads every column.
  pub fn select(&self) -> Option<&'static str> {
    match self {
      Self::Festivals => {
        Some("id,name,subtitle,description,when_to_go,city_name,images,start_date,end_date")
      }
      Self::FestivalDetails => {
        Some("id,name,subtitle,description,when_to_go,tips,what_to_wear,images,city_id,city_name")
      }
      Self::Cities => Some("id, city, state, country"),
      Self::Utilities => Some("id, name, map_query, image"),
      Self::Areas { .. } | Self::Celebrations { .. } => None,
      Self::AppConfig => Some("config_name, config_value"),
    }
  }

  pub fn request(&self) -> QueryRequest {
    let request = QueryRequest::new(self.cache_key(), self.table());
    match self.select() {
      Some(select) => request.with_select(select),
      None => request,
    }
  }
}
