// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! weekcal: timetable photo to weekly calendar
//!
//! Scan a photographed schedule, edit the resulting week and export it
//! as an .ics file.

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use weekcal::config::AppConfig;
use weekcal::db::Database;
use weekcal::event::{adjust_time, parse_time, ScheduleEvent, Weekday};
use weekcal::gemini::GeminiClient;
use weekcal::history::History;
use weekcal::ics::{build_calendar, open_with_default_app, write_ics_file};
use weekcal::scanner::{ScanResult, ScanSession};
use weekcal::store::ScheduleStore;
use weekcal::watcher::{existing_images, wait_for_stable, InboxEvent, InboxWatcher};
use weekcal::{Result, WeekcalError};

/// weekcal CLI - timetable photo to weekly calendar
#[derive(Parser, Debug)]
#[command(name = "weekcal")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Turn a photographed weekly timetable into a recurring calendar", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a timetable photo and add its events to the schedule
    Scan {
        /// Photo of the timetable
        image: PathBuf,

        /// Export the calendar right after a successful scan
        #[arg(long)]
        export: bool,
    },

    /// Show the schedule
    List {
        /// Only this day
        #[arg(short, long)]
        day: Option<Weekday>,
    },

    /// Add an event by hand
    Add {
        title: String,

        /// Start time, e.g. "9:00 AM"
        #[arg(short, long)]
        start: String,

        /// End time, e.g. "10:30 AM"
        #[arg(short, long)]
        end: String,

        #[arg(short, long)]
        day: Weekday,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Change an event (id or unique id prefix)
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(long)]
        day: Option<Weekday>,

        /// New location; empty string removes it
        #[arg(long)]
        location: Option<String>,

        /// New notes; empty string removes them
        #[arg(long)]
        notes: Option<String>,

        /// Shift both start and end by this many minutes
        #[arg(long, allow_negative_numbers = true)]
        shift_minutes: Option<i64>,
    },

    /// Remove an event
    Delete { id: String },

    /// Move an event to another day and position
    Move {
        id: String,

        #[arg(short, long)]
        day: Weekday,

        /// Position within the day (0 = first)
        #[arg(short, long, default_value = "0")]
        index: usize,
    },

    /// Write the schedule as an .ics file
    Export {
        /// Output file (default: <cache_dir>/ics_files/<file_name>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Open the file with the default calendar application
        #[arg(long)]
        open: bool,

        /// Override the PRODID written to the calendar
        #[arg(long, allow_hyphen_values = true)]
        prod_id: Option<String>,
    },

    /// Scan history
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show AI engine and storage status
    Status,

    /// Initialize a new weekcal project
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Watch inbox directories and scan new photos
    Watch {
        /// Directories to watch (overrides config)
        #[arg(short, long)]
        dir: Vec<PathBuf>,

        /// Skip the API health check on startup
        #[arg(long)]
        skip_health_check: bool,

        /// Scan photos already in the inbox on startup
        #[arg(long)]
        process_existing: bool,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent scans
    List {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Clear all history
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    debug!("weekcal v1.0.0");

    let config = AppConfig::load(&cli.config)?;
    let json = cli.format == "json";

    match cli.command {
        Some(Commands::Scan { image, export }) => run_scan(&config, &image, export, json).await,
        Some(Commands::List { day }) => run_list(&config, day, json),
        Some(Commands::Add { title, start, end, day, location, notes }) => {
            run_add(&config, title, start, end, day, location, notes, json)
        }
        Some(Commands::Edit { id, title, start, end, day, location, notes, shift_minutes }) => {
            let changes = EventChanges { title, start, end, day, location, notes, shift_minutes };
            run_edit(&config, &id, changes, json)
        }
        Some(Commands::Delete { id }) => run_delete(&config, &id),
        Some(Commands::Move { id, day, index }) => run_move(&config, &id, day, index, json),
        Some(Commands::Export { output, open, prod_id }) => run_export(&config, output, open, prod_id),
        Some(Commands::History { action }) => run_history_command(&config, action, json),
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Status) => run_status(&config).await,
        Some(Commands::Init { dir, force }) => run_init(dir, force),
        Some(Commands::Watch { dir, skip_health_check, process_existing }) => {
            run_watch(config, dir, skip_health_check, process_existing).await
        }
        None => run_list(&config, None, json),
    }
}

/// Open the schedule database, creating its directory if needed
fn open_db(config: &AppConfig) -> Result<Database> {
    let path = config.database_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Database::open(&path)
}

/// Find an event by id or by a unique id prefix
fn resolve_id(store: &ScheduleStore, id: &str) -> Result<String> {
    if store.get(id).is_some() {
        return Ok(id.to_string());
    }

    let matches: Vec<&ScheduleEvent> = store
        .events()
        .iter()
        .filter(|e| e.id.starts_with(id))
        .collect();

    match matches.as_slice() {
        [event] if !id.is_empty() => Ok(event.id.clone()),
        _ => Err(WeekcalError::EventNotFound(id.to_string())),
    }
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn print_event(event: &ScheduleEvent) {
    let mut line = format!(
        "  {:>8} - {:<8}  {}",
        event.start_time, event.end_time, event.title
    );
    if let Some(ref location) = event.location {
        line.push_str(&format!(" @ {}", location));
    }
    line.push_str(&format!("  [{}]", short_id(&event.id)));
    println!("{}", line);
    if let Some(ref notes) = event.notes {
        println!("            {}", notes);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Scan one photo into the stored schedule
async fn run_scan(config: &AppConfig, image: &Path, export: bool, json: bool) -> Result<()> {
    let client = GeminiClient::from_config(config)?;
    let db = open_db(config)?;
    let mut store = db.load_store()?;

    let session = ScanSession::from_config(config, Arc::new(client));
    let result = session.process(image, &mut store).await?;

    if !result.events.is_empty() {
        db.save_store(&store)?;
    }

    if json {
        print_json(&result)?;
    } else {
        print_scan_result(&result);
    }

    if export && result.state.scan_success {
        run_export(config, None, false, None)?;
    }
    Ok(())
}

fn print_scan_result(result: &ScanResult) {
    if let Some(ref message) = result.state.message {
        println!("{}", message);
        return;
    }
    println!("Found {} events:", result.events.len());
    for event in &result.events {
        println!("{}", event.day);
        print_event(event);
    }
}

fn run_list(config: &AppConfig, day: Option<Weekday>, json: bool) -> Result<()> {
    let store = open_db(config)?.load_store()?;

    if json {
        return match day {
            Some(day) => print_json(&store.day(day)),
            None => print_json(&store.events()),
        };
    }

    if store.is_empty() {
        println!("No events yet. Try: weekcal scan <photo>");
        return Ok(());
    }

    for (d, events) in store.week() {
        if day.map_or(false, |wanted| wanted != d) {
            continue;
        }
        println!("{}", d);
        if events.is_empty() {
            println!("  -");
        }
        for event in events {
            print_event(event);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_add(
    config: &AppConfig,
    title: String,
    start: String,
    end: String,
    day: Weekday,
    location: Option<String>,
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    parse_time(&start)?;
    parse_time(&end)?;

    let db = open_db(config)?;
    let mut store = db.load_store()?;

    let mut event = ScheduleEvent::new(title, start, end, day);
    event.location = location.filter(|l| !l.trim().is_empty());
    event.notes = notes.filter(|n| !n.trim().is_empty());

    store.add(event.clone());
    db.save_store(&store)?;

    if json {
        print_json(&event)?;
    } else {
        println!("Added {} [{}]", event.title, short_id(&event.id));
    }
    Ok(())
}

/// Field overrides for `edit`
#[derive(Debug, Default)]
struct EventChanges {
    title: Option<String>,
    start: Option<String>,
    end: Option<String>,
    day: Option<Weekday>,
    location: Option<String>,
    notes: Option<String>,
    shift_minutes: Option<i64>,
}

impl EventChanges {
    fn apply(self, event: &mut ScheduleEvent) -> Result<()> {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(start) = self.start {
            parse_time(&start)?;
            event.start_time = start;
        }
        if let Some(end) = self.end {
            parse_time(&end)?;
            event.end_time = end;
        }
        if let Some(day) = self.day {
            event.day = day;
        }
        if let Some(location) = self.location {
            event.location = Some(location).filter(|l| !l.trim().is_empty());
        }
        if let Some(notes) = self.notes {
            event.notes = Some(notes).filter(|n| !n.trim().is_empty());
        }
        if let Some(minutes) = self.shift_minutes {
            event.start_time = adjust_time(&event.start_time, minutes)?;
            event.end_time = adjust_time(&event.end_time, minutes)?;
        }
        Ok(())
    }
}

fn run_edit(config: &AppConfig, id: &str, changes: EventChanges, json: bool) -> Result<()> {
    let db = open_db(config)?;
    let mut store = db.load_store()?;
    let id = resolve_id(&store, id)?;

    let mut event = store
        .get(&id)
        .cloned()
        .ok_or_else(|| WeekcalError::EventNotFound(id.clone()))?;
    changes.apply(&mut event)?;

    store.update(event.clone());
    db.save_store(&store)?;

    if json {
        print_json(&event)?;
    } else {
        println!("Updated:");
        print_event(&event);
    }
    Ok(())
}

fn run_delete(config: &AppConfig, id: &str) -> Result<()> {
    let db = open_db(config)?;
    let mut store = db.load_store()?;
    let id = resolve_id(&store, id)?;

    store.delete(&id);
    db.save_store(&store)?;
    println!("Deleted [{}]", short_id(&id));
    Ok(())
}

fn run_move(config: &AppConfig, id: &str, day: Weekday, index: usize, json: bool) -> Result<()> {
    let db = open_db(config)?;
    let mut store = db.load_store()?;
    let id = resolve_id(&store, id)?;

    store.move_event(&id, day, index);
    db.save_store(&store)?;

    if json {
        print_json(&store.day(day))?;
    } else {
        println!("{}", day);
        for event in store.day(day) {
            print_event(event);
        }
    }
    Ok(())
}

fn run_export(
    config: &AppConfig,
    output: Option<PathBuf>,
    open: bool,
    prod_id: Option<String>,
) -> Result<()> {
    let store = open_db(config)?.load_store()?;
    let prod_id = prod_id.unwrap_or_else(|| config.export.prod_id.clone());

    let export = build_calendar(store.events(), &prod_id, Local::now().date_naive(), Utc::now());
    for title in &export.skipped {
        warn!("Skipped '{}': unreadable start or end time", title);
    }

    let path = match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &export.content)?;
            path
        }
        None => write_ics_file(&config.cache_dir(), &config.export.file_name, &export.content)?,
    };

    println!("Exported {} events to {}", export.exported, path.display());
    if !export.skipped.is_empty() {
        println!("Skipped {} events with unreadable times", export.skipped.len());
    }

    if open {
        open_with_default_app(&path)?;
    }
    Ok(())
}

/// Run history commands
fn run_history_command(config: &AppConfig, action: HistoryCommands, json: bool) -> Result<()> {
    let history = History::new(config.history_path());

    match action {
        HistoryCommands::List { count } => {
            let entries = history.get_recent(count)?;
            if json {
                return print_json(&entries);
            }
            println!("Recent scans ({} entries):", entries.len());
            for entry in entries {
                println!(
                    "  {} {:<15} {:>3} events  {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.outcome.to_string(),
                    entry.event_count,
                    entry.message.as_deref().unwrap_or("")
                );
            }
        }
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing history");
                return Ok(());
            }
            history.clear()?;
            println!("History cleared");
        }
    }

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            print_json(&config)?;
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Model: {}", config.ai_engine.model);
            println!("  API key variable: {}", config.ai_engine.api_key_env);
            println!("  Database: {}", config.storage.database);
            if config.api_key().is_err() {
                println!("  Warning: {} is not set", config.ai_engine.api_key_env);
            }
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: &AppConfig) -> Result<()> {
    println!("weekcal v1.0.0 Status");
    println!("=====================");

    println!("\nAI engine ({}):", config.ai_engine.url);
    match GeminiClient::from_config(config) {
        Ok(client) => {
            match client.health_check().await {
                Ok(()) => println!("  API: reachable"),
                Err(e) => println!("  API: Error - {}", e),
            }
            match client.model_available(client.model()).await {
                Ok(true) => println!("  Model {}: available", client.model()),
                Ok(false) => println!("  Model {}: not listed", client.model()),
                Err(e) => println!("  Model {}: Error - {}", client.model(), e),
            }
        }
        Err(e) => println!("  {}", e),
    }

    match open_db(config) {
        Ok(db) => {
            let stats = db.get_stats()?;
            println!("\nSchedule ({}):", config.storage.database);
            println!("  Events: {}", stats.event_count);
            for (day, count) in stats.per_day {
                println!("  {:<10} {}", day.to_string(), count);
            }
        }
        Err(e) => println!("\nDatabase: Error - {}", e),
    }

    let history = History::new(config.history_path());
    match history.get_recent(1) {
        Ok(recent) => match recent.first() {
            Some(last) => println!(
                "\nLast scan: {} ({})",
                last.timestamp.format("%Y-%m-%d %H:%M"),
                last.outcome
            ),
            None => println!("\nLast scan: never"),
        },
        Err(e) => println!("\nHistory: Error - {}", e),
    }

    println!("\nConfiguration:");
    println!("  Watch paths: {:?}", config.watch_paths);
    println!("  Data dir: {}", config.storage.data_dir);
    println!("  Export: {}/ics_files/{}", config.export.cache_dir, config.export.file_name);

    Ok(())
}

/// Initialize a new weekcal project
fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(WeekcalError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    let inbox = target.join("inbox");
    let data = target.join("data");
    let cache = target.join("cache");
    for dir in [&inbox, &data, &cache] {
        std::fs::create_dir_all(dir)?;
    }

    let mut config = AppConfig::default();
    config.watch_paths = vec![inbox.to_string_lossy().to_string()];
    config.storage.data_dir = data.to_string_lossy().to_string();
    config.storage.database = data.join("weekcal.db").to_string_lossy().to_string();
    config.storage.history_file = data.join("weekcal_history.jsonl").to_string_lossy().to_string();
    config.export.cache_dir = cache.to_string_lossy().to_string();
    config.save(&config_path)?;

    println!("weekcal initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    println!("  - inbox/");
    println!("  - data/");
    println!("  - cache/");
    println!("\nNext steps:");
    println!("  1. export {}=<your key>", config.ai_engine.api_key_env);
    println!("  2. weekcal scan <photo>   (or drop photos into inbox/ and run: weekcal watch)");

    Ok(())
}

/// Resolve when Ctrl+C or SIGTERM arrives
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

/// Scan one inbox photo and persist the result
async fn process_photo(path: &Path, session: &ScanSession, db: &Database) -> Result<()> {
    let mut store = db.load_store()?;
    let result = session.process(path, &mut store).await?;

    match result.state.message {
        Some(ref message) => warn!("{:?}: {}", path, message),
        None => {
            db.save_store(&store)?;
            info!("Added {} events from {:?}", result.events.len(), path);
        }
    }
    Ok(())
}

/// Run the watch mode (inbox loop)
async fn run_watch(
    config: AppConfig,
    dir_overrides: Vec<PathBuf>,
    skip_health_check: bool,
    process_existing: bool,
) -> Result<()> {
    let watch_paths: Vec<PathBuf> = if dir_overrides.is_empty() {
        config.watch_paths.iter().map(PathBuf::from).collect()
    } else {
        dir_overrides
    };

    info!("Watch directories: {:?}", watch_paths);

    let client = GeminiClient::from_config(&config)?;

    if !skip_health_check {
        info!("Checking Gemini availability...");
        client.health_check().await?;
        if client.model_available(client.model()).await? {
            info!("Model '{}' available", client.model());
        } else {
            warn!("Model '{}' not listed by the API", client.model());
        }
    } else {
        warn!("Skipping API health check");
    }

    let db = open_db(&config)?;
    let session = ScanSession::from_config(&config, Arc::new(client));

    let mut watcher = InboxWatcher::new()?;
    for path in &watch_paths {
        watcher.watch(path)?;
    }

    if process_existing {
        info!("Processing existing photos...");
        for dir in watcher.inboxes() {
            for path in existing_images(dir) {
                if let Err(e) = process_photo(&path, &session, &db).await {
                    error!("Failed to process {:?}: {}", path, e);
                }
            }
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!("Watching for timetable photos. Press Ctrl+C to stop.");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match watcher.next_event(Duration::from_millis(100)) {
            Some(InboxEvent::PhotoArrived(path)) => {
                if !wait_for_stable(&path, Duration::from_secs(10)).await {
                    debug!("File disappeared during stability check: {:?}", path);
                    continue;
                }
                if let Err(e) = process_photo(&path, &session, &db).await {
                    error!("Failed to process {:?}: {}", path, e);
                }
            }
            Some(InboxEvent::Error(e)) => warn!("Watch error: {}", e),
            _ => {}
        }
    }

    info!("weekcal stopped.");
    Ok(())
}
