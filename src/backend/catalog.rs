//! Filtering and grouping applied to catalogue lists before display.

use std::collections::BTreeMap;

use super::types::{Area, Celebration, City, Festival};

/// Metro station group for celebrations without one
pub const OTHER_STATION: &str = "Others";

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
  haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

/// Festivals in `city` (case-insensitive, all when `None`) matching `search`
/// on name, subtitle or city, sorted by id.
pub fn filter_festivals<'a>(
  festivals: &'a [Festival],
  city: Option<&str>,
  search: &str,
) -> Vec<&'a Festival> {
  let city = city.map(str::to_lowercase);
  let search = search.trim().to_lowercase();

  let mut matching: Vec<&Festival> = festivals
    .iter()
    .filter(|f| match &city {
      Some(city) => f.city_name.as_deref().map(str::to_lowercase).as_ref() == Some(city),
      None => true,
    })
    .filter(|f| {
      search.is_empty()
        || contains_ignore_case(Some(&f.name), &search)
        || contains_ignore_case(f.subtitle.as_deref(), &search)
        || contains_ignore_case(f.city_name.as_deref(), &search)
    })
    .collect();

  matching.sort_by_key(|f| f.id);
  matching
}

/// Look a festival up by id.
pub fn find_festival(festivals: &[Festival], id: i64) -> Option<&Festival> {
  festivals.iter().find(|f| f.id == id)
}

/// Areas of `city_id`, sorted by id.
pub fn areas_in_city(areas: &[Area], city_id: i64) -> Vec<&Area> {
  let mut matching: Vec<&Area> = areas.iter().filter(|a| a.city_id == Some(city_id)).collect();
  matching.sort_by_key(|a| a.id);
  matching
}

/// Which celebrations to show for an area.
#[derive(Debug, Clone, Default)]
pub struct CelebrationFilter<'a> {
  pub area_id: Option<i64>,
  pub city_id: Option<i64>,
  pub festival_id: Option<i64>,
  pub search: &'a str,
}

/// Celebrations matching `filter`, sorted by id and grouped by metro station.
pub fn group_celebrations<'a>(
  celebrations: &'a [Celebration],
  filter: &CelebrationFilter<'_>,
) -> BTreeMap<String, Vec<&'a Celebration>> {
  let search = filter.search.trim().to_lowercase();
  let matches_id = |wanted: Option<i64>, actual: Option<i64>| wanted.is_none() || wanted == actual;

  let mut matching: Vec<&Celebration> = celebrations
    .iter()
    .filter(|c| matches_id(filter.area_id, c.area_id))
    .filter(|c| matches_id(filter.city_id, c.city_id))
    .filter(|c| matches_id(filter.festival_id, c.festival_id))
    .filter(|c| {
      search.is_empty()
        || contains_ignore_case(Some(&c.name), &search)
        || contains_ignore_case(c.address.as_deref(), &search)
    })
    .collect();
  matching.sort_by_key(|c| c.id);

  let mut groups: BTreeMap<String, Vec<&Celebration>> = BTreeMap::new();
  for celebration in matching {
    let station = celebration
      .metro_station
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .unwrap_or(OTHER_STATION);
    groups.entry(station.to_string()).or_default().push(celebration);
  }
  groups
}

/// City to show: the stored selection, else the first known city.
pub fn effective_city<'a>(selected: Option<&'a str>, cities: &'a [City]) -> Option<&'a str> {
  selected.or_else(|| cities.first().map(|c| c.city.as_str()))
}
