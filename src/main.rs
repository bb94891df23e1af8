mod api;
mod app;
mod auth;
mod cache;
mod commands;
mod config;
mod context;
mod event;
mod logging;
mod store;
mod sync;
mod ui;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::store::{KeyValueStore, MemoryStore, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "winix")]
#[command(about = "A terminal client for WINIX with cached background sync")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/winix/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Telegram user id to sync for
  #[arg(short, long)]
  user_id: Option<String>,

  /// Mini-app launch URL carrying user_id or tgWebAppData
  #[arg(long)]
  launch_url: Option<String>,

  /// Keep state in memory only
  #[arg(long)]
  ephemeral: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = logging::init()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Command line wins over file and environment
  if let Some(user_id) = args.user_id {
    config.user.id = Some(user_id);
  }

  let launch_url = args
    .launch_url
    .as_deref()
    .map(Url::parse)
    .transpose()
    .map_err(|e| eyre!("Invalid launch URL: {}", e))?;

  let store: Arc<dyn KeyValueStore> = if args.ephemeral {
    Arc::new(MemoryStore::new())
  } else {
    Arc::new(SqliteStore::open().map_err(|e| eyre!("Failed to open state store: {}", e))?)
  };

  // Initialize and run the app
  let mut app = app::App::new(config, store, launch_url)?;
  app.run().await?;

  Ok(())
}
