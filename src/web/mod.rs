// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Web board and JSON API for the weekly schedule

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::db::Database;
use crate::event::{ScheduleEvent, Weekday};
use crate::gemini::ScheduleExtractor;
use crate::ics::{build_calendar, ICS_MIME_TYPE};
use crate::scanner::{ScanSession, ScanState};
use crate::store::ScheduleStore;
use crate::WeekcalError;

/// Shared application state
pub struct AppState {
    pub store: Mutex<ScheduleStore>,
    pub db: Database,
    pub config: AppConfig,
    /// Absent when no API key is configured
    pub scanner: Option<ScanSession>,
}

impl AppState {
    /// State seeded with the schedule stored in `db`
    pub fn load(
        config: AppConfig,
        db: Database,
        extractor: Option<Arc<dyn ScheduleExtractor>>,
    ) -> crate::Result<Self> {
        let store = db.load_store()?;
        info!("Loaded {} events", store.len());
        let scanner = extractor.map(|e| ScanSession::from_config(&config, e));
        Ok(Self {
            store: Mutex::new(store),
            db,
            config,
            scanner,
        })
    }
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Pages
        .route("/", get(board_page))
        // API endpoints
        .route("/api/events", get(api_list_events).post(api_add_event))
        .route("/api/events/:id", put(api_update_event).delete(api_delete_event))
        .route("/api/events/:id/move", post(api_move_event))
        .route("/api/schedule", get(api_schedule))
        .route("/api/export.ics", get(api_export))
        .route("/api/scan", post(api_scan))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// === Errors ===

struct ApiError(WeekcalError);

impl From<WeekcalError> for ApiError {
    fn from(e: WeekcalError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            WeekcalError::EventNotFound(_) => StatusCode::NOT_FOUND,
            WeekcalError::ScanInProgress => StatusCode::CONFLICT,
            WeekcalError::MissingApiKey(_) => StatusCode::SERVICE_UNAVAILABLE,
            WeekcalError::InvalidTime(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Save `next` and only then make it the live store, so a failed write
/// leaves memory matching the database
fn commit(state: &AppState, store: &mut ScheduleStore, next: ScheduleStore) -> ApiResult<()> {
    state.db.save_store(&next)?;
    *store = next;
    Ok(())
}

// === Page Handlers ===

async fn board_page(State(state): State<Arc<AppState>>) -> Html<String> {
    let store = state.store.lock().await;
    Html(render_board(&store))
}

// === API Handlers ===

async fn api_list_events(State(state): State<Arc<AppState>>) -> Json<Vec<ScheduleEvent>> {
    let store = state.store.lock().await;
    Json(store.events().to_vec())
}

#[derive(Serialize)]
struct DaySchedule {
    day: Weekday,
    events: Vec<ScheduleEvent>,
}

async fn api_schedule(State(state): State<Arc<AppState>>) -> Json<Vec<DaySchedule>> {
    let store = state.store.lock().await;
    let week = store
        .week()
        .into_iter()
        .map(|(day, events)| DaySchedule {
            day,
            events: events.into_iter().cloned().collect(),
        })
        .collect();
    Json(week)
}

async fn api_add_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ScheduleEvent>,
) -> ApiResult<(StatusCode, Json<ScheduleEvent>)> {
    let mut store = state.store.lock().await;
    let mut next = store.clone();
    next.add(event.clone());
    commit(&state, &mut store, next)?;
    info!("Added '{}' on {}", event.title, event.day);
    Ok((StatusCode::CREATED, Json(event)))
}

async fn api_update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut event): Json<ScheduleEvent>,
) -> ApiResult<Json<ScheduleEvent>> {
    event.id = id.clone();
    let mut store = state.store.lock().await;
    let mut next = store.clone();
    if !next.update(event.clone()) {
        return Err(WeekcalError::EventNotFound(id).into());
    }
    commit(&state, &mut store, next)?;
    Ok(Json(event))
}

async fn api_delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let mut store = state.store.lock().await;
    let mut next = store.clone();
    if !next.delete(&id) {
        return Err(WeekcalError::EventNotFound(id).into());
    }
    commit(&state, &mut store, next)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct MoveRequest {
    day: Weekday,
    index: usize,
}

async fn api_move_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> ApiResult<Json<Vec<ScheduleEvent>>> {
    let mut store = state.store.lock().await;
    let mut next = store.clone();
    if !next.move_event(&id, request.day, request.index) {
        return Err(WeekcalError::EventNotFound(id).into());
    }
    commit(&state, &mut store, next)?;
    Ok(Json(store.day(request.day).into_iter().cloned().collect()))
}

async fn api_export(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.store.lock().await;
    let export = build_calendar(
        store.events(),
        &state.config.export.prod_id,
        chrono::Local::now().date_naive(),
        chrono::Utc::now(),
    );
    if !export.skipped.is_empty() {
        warn!("Export skipped {} events with bad times", export.skipped.len());
    }

    let disposition = format!("attachment; filename=\"{}\"", state.config.export.file_name);
    (
        [
            (header::CONTENT_TYPE, ICS_MIME_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.content,
    )
}

async fn api_scan(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Json<ScanState>> {
    let scanner = state
        .scanner
        .as_ref()
        .ok_or_else(|| WeekcalError::MissingApiKey(state.config.ai_engine.api_key_env.clone()))?;

    if scanner.is_busy() {
        return Err(WeekcalError::ScanInProgress.into());
    }

    let data_dir = state.config.data_dir();
    tokio::fs::create_dir_all(&data_dir)
        .await
        .map_err(WeekcalError::from)?;
    let extension = image::guess_format(&body)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("jpg");
    // Unique per request
    let upload = data_dir.join(format!("upload-{}.{}", uuid::Uuid::new_v4(), extension));

    let result = match tokio::fs::write(&upload, &body).await {
        Ok(()) => scanner.scan(&upload).await,
        Err(e) => Err(WeekcalError::from(e)),
    };
    if let Err(e) = tokio::fs::remove_file(&upload).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove upload {:?}: {}", upload, e);
        }
    }
    let result = result?;

    if !result.events.is_empty() {
        let mut store = state.store.lock().await;
        let mut next = store.clone();
        next.extend(result.events);
        commit(&state, &mut store, next)?;
    }

    Ok(Json(result.state))
}

// === Template Rendering ===

fn base_template(title: &str, content: &str) -> String {
    format!(r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{} - weekcal</title>
    <style>
        :root {{
            --bg-primary: #1a1a2e;
            --bg-card: #0f3460;
            --text-primary: #e8e8e8;
            --text-secondary: #a0a0a0;
            --accent: #e94560;
            --border: #2a2a4a;
        }}
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
        }}
        .container {{ max-width: 1400px; margin: 0 auto; padding: 20px; }}
        .week {{
            display: grid;
            grid-template-columns: repeat(7, 1fr);
            gap: 12px;
        }}
        .day h2 {{ color: var(--accent); font-size: 1em; margin-bottom: 8px; }}
        .event {{
            background: var(--bg-card);
            border: 1px solid var(--border);
            border-radius: 8px;
            padding: 8px;
            margin-bottom: 8px;
        }}
        .event .time, .event .where {{ color: var(--text-secondary); font-size: 0.85em; }}
        a.export {{ color: var(--accent); }}
    </style>
</head>
<body>
    <main class="container">
        {}
    </main>
</body>
</html>"#, title, content)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_board(store: &ScheduleStore) -> String {
    let columns: String = store
        .week()
        .into_iter()
        .map(|(day, events)| {
            let cards: String = events
                .iter()
                .map(|e| {
                    let location = e
                        .location
                        .as_deref()
                        .map(|l| format!(r#"<div class="where">{}</div>"#, escape(l)))
                        .unwrap_or_default();
                    format!(
                        r#"<div class="event"><strong>{}</strong><div class="time">{} - {}</div>{}</div>"#,
                        escape(&e.title),
                        escape(&e.start_time),
                        escape(&e.end_time),
                        location
                    )
                })
                .collect();
            format!(r#"<section class="day"><h2>{}</h2>{}</section>"#, day, cards)
        })
        .collect();

    let content = format!(
        r#"<h1>My week</h1>
        <p><a class="export" href="/api/export.ics">Export to calendar</a> ({} events)</p>
        <div class="week">{}</div>"#,
        store.len(),
        columns
    );

    base_template("Schedule", &content)
}

/// Start the web server
pub async fn start_server(state: Arc<AppState>) -> crate::Result<()> {
    let addr = format!("{}:{}", state.config.web.host, state.config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Schedule board available at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .await
        .map_err(|e| WeekcalError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
