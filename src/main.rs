mod config;
mod message;
mod mirror;
mod server;
mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::mirror::github::GithubMirror;
use crate::mirror::MessageMirror;
use crate::server::AppState;
use crate::store::MessageStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,msgmirror=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let init_only = args.iter().any(|a| a == "--init-db");
    let explicit_path = args.iter().find(|a| !a.starts_with("--")).map(PathBuf::from);

    if config::load_dotenv(Path::new(".env"))? {
        info!("Loaded environment overrides from .env");
    }

    // Load configuration
    let config = match &explicit_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            let default_path = PathBuf::from("config.toml");
            if default_path.exists() {
                info!("Loading configuration from: {}", default_path.display());
                Config::load(&default_path)?
            } else {
                info!("No config.toml found, using defaults");
                Config::from_env()?
            }
        }
    };

    info!("Configuration loaded successfully");
    info!("  Bind address: {}", config.server.bind_address);
    info!("  Database: {}", config.storage.database_path.display());
    info!("  Homepage: {}", config.web.index_path.display());

    let store = MessageStore::open(&config.storage.database_path)?;
    if init_only {
        info!(
            "Database initialized successfully at {}",
            config.storage.database_path.display()
        );
        return Ok(());
    }

    config.validate_github()?;
    let mirror: Option<Arc<dyn MessageMirror>> = match &config.github {
        Some(github) => {
            Some(Arc::new(GithubMirror::new(github.clone())?) as Arc<dyn MessageMirror>)
        }
        None => {
            warn!(
                "No [github] section or GITHUB_TOKEN/GITHUB_REPO set; remote mirroring disabled"
            );
            None
        }
    };

    let state = Arc::new(AppState::new(config, store, mirror));
    server::run(state).await
}
