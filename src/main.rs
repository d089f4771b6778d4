mod backend;
mod cache;
mod commands;
mod config;
mod context;
mod local;
mod query;
#[cfg(test)]
mod testing;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "parikrama")]
#[command(about = "Browse the Parikrama festival catalogue, online or offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/parikrama/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Also write logs to stderr
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging(args.verbose)?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let ctx = context::AppContext::open(config)?;
  commands::run(&ctx, args.command).await?;

  Ok(())
}

/// Log to a file in the data directory, filtered by `PARIKRAMA_LOG`.
fn init_logging(verbose: bool) -> Result<WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("parikrama");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let (writer, guard) =
    tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, "parikrama.log"));

  let filter = EnvFilter::try_from_env("PARIKRAMA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  let stderr = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .with(stderr)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
