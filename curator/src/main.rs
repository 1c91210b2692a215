/*
curator - single-binary main.rs
This binary loads secrets and configuration, then serves the review UI and its JSON API.
*/

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use common::Config;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use curator::components::Components;
use curator::server::{launch_rocket, AppState};

#[derive(Parser, Debug)]
#[command(name = "curator", about = "Human-verified news curation server")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the .env file holding API keys
    #[arg(long, value_name = "FILE", default_value = ".env")]
    env_file: PathBuf,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Secrets come from the environment; .env is optional
    match dotenv::from_path(&args.env_file) {
        Ok(()) => info!(path = ?args.env_file, "environment file loaded"),
        Err(e) => warn!(path = ?args.env_file, "environment file not loaded: {}", e),
    }

    let config = load_config(args.config).await?;
    let components = Components::from_config(&config)?;
    let state = AppState::new(config, components.controller());

    info!("Launching Rocket HTTP server");
    if let Err(e) = launch_rocket(state).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    .map_err(|e| {
        error!("failed to load configuration: {:#}", e);
        e
    })?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}
