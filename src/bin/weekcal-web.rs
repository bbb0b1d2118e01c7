// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! weekcal web board
//!
//! Serves the editable week and the JSON API used to scan, edit and export it.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use weekcal::config::AppConfig;
use weekcal::db::Database;
use weekcal::gemini::{GeminiClient, ScheduleExtractor};
use weekcal::web::{start_server, AppState};
use weekcal::Result;

#[derive(Parser, Debug)]
#[command(name = "weekcal-web")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "weekcal schedule board server")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Open browser automatically
    #[arg(long)]
    open: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("weekcal web board v1.0.0");

    let mut config = AppConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(host) = args.host {
        config.web.host = host;
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::open(&db_path)?;
    info!("Database: {:?}", db_path);

    // Editing and export work without a key; scanning does not
    let extractor: Option<Arc<dyn ScheduleExtractor>> = match GeminiClient::from_config(&config) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("Scanning disabled: {}", e);
            None
        }
    };

    let state = Arc::new(AppState::load(config, db, extractor)?);

    if args.open {
        let url = format!("http://{}:{}", state.config.web.host, state.config.web.port);
        if let Err(e) = open_browser(&url) {
            error!("Failed to open browser: {}", e);
        }
    }

    start_server(state).await
}

fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }
    Ok(())
}
