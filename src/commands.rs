/// Command-line subcommands and their handlers
use clap::{Args, Subcommand};
use color_eyre::{eyre::eyre, Result};

use crate::backend::app_config::AppConfig;
use crate::backend::catalog::{self, CelebrationFilter};
use crate::cache::{KeyValueStore, RemoteSource};
use crate::context::AppContext;
use crate::local::onboarding;
use crate::query::CachedQuery;

#[derive(Debug, Subcommand)]
pub enum Command {
  /// List festivals in the selected city
  Festivals {
    /// Only festivals whose name, subtitle or city contains this
    #[arg(short, long, default_value = "")]
    search: String,
    /// Ignore the selected city
    #[arg(long)]
    all_cities: bool,
    #[command(flatten)]
    fetch: FetchArgs,
  },
  /// Show one festival and the areas of its city
  Festival {
    id: i64,
    #[command(flatten)]
    fetch: FetchArgs,
  },
  /// List cities
  Cities {
    #[command(flatten)]
    fetch: FetchArgs,
  },
  /// Show or change the selected city
  City {
    #[command(subcommand)]
    action: Option<CityAction>,
  },
  /// List the areas of a city
  Areas {
    city_id: i64,
    #[command(flatten)]
    fetch: FetchArgs,
  },
  /// List celebrations in an area, grouped by metro station
  Celebrations {
    area_id: i64,
    /// Only celebrations in this city
    #[arg(long)]
    city: Option<i64>,
    /// Only celebrations of this festival
    #[arg(long)]
    festival: Option<i64>,
    /// Only celebrations whose name or address contains this
    #[arg(short, long, default_value = "")]
    search: String,
    #[command(flatten)]
    fetch: FetchArgs,
  },
  /// List utility locations
  Utilities {
    #[command(flatten)]
    fetch: FetchArgs,
  },
  /// Print app configuration, or one key of it
  Config {
    key: Option<String>,
    /// Printed when the key is not configured
    #[arg(short, long, default_value = "")]
    default: String,
  },
  /// Onboarding status and slides
  Onboarding {
    #[command(subcommand)]
    action: Option<OnboardingAction>,
  },
  /// Personal notes
  Notes {
    #[command(subcommand)]
    action: Option<NotesAction>,
  },
}

#[derive(Debug, Args)]
pub struct FetchArgs {
  /// Fetch again after the initial load
  #[arg(long)]
  refresh: bool,
}

#[derive(Debug, Subcommand)]
pub enum CityAction {
  /// Select a city
  Set { name: String },
  /// Forget the selected city
  Clear,
}

#[derive(Debug, Subcommand)]
pub enum OnboardingAction {
  /// Whether the current onboarding has been seen
  Status,
  /// Mark the current onboarding as seen
  Complete,
  /// Print the onboarding slides
  Slides,
}

#[derive(Debug, Subcommand)]
pub enum NotesAction {
  /// List notes, newest first
  List,
  /// Add a note
  Add {
    #[arg(short, long, default_value = "")]
    title: String,
    #[arg(short, long, default_value = "")]
    body: String,
  },
  /// Replace a note's title and body
  Edit {
    id: String,
    #[arg(short, long, default_value = "")]
    title: String,
    #[arg(short, long, default_value = "")]
    body: String,
  },
  /// Delete a note
  Delete { id: String },
}

/// Load a query to a terminal state, refreshing once if asked.
async fn resolve<T: Default + Send + 'static>(
  mut query: CachedQuery<T>,
  fetch: &FetchArgs,
) -> CachedQuery<T> {
  query.load();
  query.settle().await;
  if fetch.refresh {
    query.refresh();
    query.settle().await;
  }
  report_status(&query);
  query
}

fn report_status<T>(query: &CachedQuery<T>)
where
  T: Default + Send + 'static,
{
  if query.is_offline() {
    eprintln!("(offline: showing saved data)");
  }
  if let Some(e) = query.error() {
    eprintln!("Could not load data: {}", e);
  }
}

pub async fn run<S, R>(ctx: &AppContext<S, R>, command: Command) -> Result<()>
where
  S: KeyValueStore + 'static,
  R: RemoteSource,
{
  match command {
    Command::Festivals {
      search,
      all_cities,
      fetch,
    } => {
      let festivals = resolve(ctx.backend.festivals(), &fetch).await;
      let city = if all_cities {
        None
      } else {
        ctx.selected_city.get()
      };
      for festival in catalog::filter_festivals(festivals.data(), city.as_deref(), &search) {
        let dates = match (&festival.start_date, &festival.end_date) {
          (Some(start), Some(end)) => format!("{} to {}", start, end),
          (Some(start), None) => start.clone(),
          _ => festival.when_to_go.clone().unwrap_or_default(),
        };
        println!("{:>4}  {:<32} {}", festival.id, festival.name, dates);
      }
    }
    Command::Festival { id, fetch } => {
      let festivals = resolve(ctx.backend.festival_details(), &fetch).await;
      let festival = catalog::find_festival(festivals.data(), id)
        .ok_or_else(|| eyre!("No festival with id {}", id))?;

      println!("{}", festival.name);
      for (label, value) in [
        ("", &festival.subtitle),
        ("City", &festival.city_name),
        ("When to go", &festival.when_to_go),
        ("About", &festival.description),
        ("Tips", &festival.tips),
        ("What to wear", &festival.what_to_wear),
      ] {
        if let Some(value) = value {
          if label.is_empty() {
            println!("{}", value);
          } else {
            println!("\n{}:\n{}", label, value);
          }
        }
      }
      for url in festival.image_urls() {
        println!("image: {}", url);
      }

      if let Some(city_id) = festival.city_id {
        let areas = resolve(ctx.backend.areas(city_id), &fetch).await;
        println!("\nAreas:");
        for area in catalog::areas_in_city(areas.data(), city_id) {
          println!("{:>4}  {}", area.id, area.area);
        }
      }
    }
    Command::Cities { fetch } => {
      let cities = resolve(ctx.backend.cities(), &fetch).await;
      let selected = ctx.selected_city.get();
      let current = catalog::effective_city(selected.as_deref(), cities.data());
      for city in cities.data() {
        let marker = if Some(city.city.as_str()) == current { "*" } else { " " };
        let region = [city.state.as_deref(), city.country.as_deref()]
          .into_iter()
          .flatten()
          .collect::<Vec<_>>()
          .join(", ");
        println!("{} {:>4}  {:<20} {}", marker, city.id, city.city, region);
      }
    }
    Command::City { action } => match action {
      Some(CityAction::Set { name }) => ctx.selected_city.set(Some(&name)),
      Some(CityAction::Clear) => ctx.selected_city.set(None),
      None => {
        let selected = ctx.selected_city.get();
        let cities = if selected.is_none() {
          resolve(ctx.backend.cities(), &FetchArgs { refresh: false }).await.data().clone()
        } else {
          Vec::new()
        };
        match catalog::effective_city(selected.as_deref(), &cities) {
          Some(city) => println!("{}", city),
          None => println!("(no city selected)"),
        }
      }
    },
    Command::Areas { city_id, fetch } => {
      let areas = resolve(ctx.backend.areas(city_id), &fetch).await;
      for area in catalog::areas_in_city(areas.data(), city_id) {
        println!("{:>4}  {}", area.id, area.area);
      }
    }
    Command::Celebrations {
      area_id,
      city,
      festival,
      search,
      fetch,
    } => {
      let celebrations = resolve(ctx.backend.celebrations(area_id), &fetch).await;
      let filter = CelebrationFilter {
        area_id: Some(area_id),
        city_id: city,
        festival_id: festival,
        search: &search,
      };
      let groups = catalog::group_celebrations(celebrations.data(), &filter);
      if let Some(first) = groups.values().flatten().next() {
        let festival = first.festival_name.as_deref().unwrap_or("");
        let area = first.area_name.as_deref().unwrap_or("");
        println!("{} - {}\n", festival, area);
      }
      for (station, group) in groups {
        println!("{}", station);
        for celebration in group {
          let address = celebration.address.as_deref().unwrap_or("");
          let distance = celebration.distance_from_metro.as_deref().unwrap_or("");
          println!("  {:>4}  {:<28} {:<32} {}", celebration.id, celebration.name, address, distance);
        }
      }
    }
    Command::Utilities { fetch } => {
      let utilities = resolve(ctx.backend.utilities(), &fetch).await;
      for utility in utilities.data() {
        let map_query = utility.map_query.as_deref().unwrap_or("");
        println!("{:>4}  {:<28} {}", utility.id, utility.name, map_query);
      }
    }
    Command::Config { key, default } => {
      let config = load_app_config(ctx).await;
      match key {
        Some(key) => println!("{}", config.get_or(&key, &default)),
        None => {
          for (name, value) in config.iter() {
            println!("{} = {}", name, value);
          }
        }
      }
    }
    Command::Onboarding { action } => {
      let config = load_app_config(ctx).await;
      let version = onboarding::version(&config);
      let flags = ctx.onboarding();
      match action.unwrap_or(OnboardingAction::Status) {
        OnboardingAction::Status => {
          let seen = if flags.is_seen(version) { "seen" } else { "not seen" };
          println!("onboarding v{}: {}", version, seen);
        }
        OnboardingAction::Complete => flags
          .mark_seen(version)
          .map_err(|e| eyre!("Failed to save onboarding flag: {}", e))?,
        OnboardingAction::Slides => {
          for (n, slide) in onboarding::slides(&config).iter().enumerate() {
            println!("{}. {}\n   {}", n + 1, slide.title, slide.text);
            if let Some(image) = &slide.image {
              println!("   {}", image);
            }
          }
        }
      }
    }
    Command::Notes { action } => {
      let notes = ctx.notes();
      match action.unwrap_or(NotesAction::List) {
        NotesAction::List => {
          for note in notes.list() {
            println!("[{}] {} ({})", note.id, note.title, note.created_at);
            if !note.body.is_empty() {
              println!("    {}", note.body);
            }
          }
        }
        NotesAction::Add { title, body } => {
          let note = notes.add(&title, &body)?;
          println!("{}", note.id);
        }
        NotesAction::Edit { id, title, body } => {
          notes.edit(&id, &title, &body)?;
        }
        NotesAction::Delete { id } => notes.delete(&id)?,
      }
    }
  }

  Ok(())
}

async fn load_app_config<S, R>(ctx: &AppContext<S, R>) -> AppConfig
where
  S: KeyValueStore + 'static,
  R: RemoteSource,
{
  resolve(ctx.backend.app_config(), &FetchArgs { refresh: false })
    .await
    .data()
    .clone()
}
