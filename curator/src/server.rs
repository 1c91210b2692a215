use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, State};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use common::Config;

use crate::session::{CurationView, ReviewSessionController};
use crate::workflow::Decision;

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub config: Arc<Config>,
    /// UI events are serialized through this lock; there is a single session per process.
    pub session: Arc<Mutex<ReviewSessionController>>,
}

impl AppState {
    pub fn new(config: Config, controller: ReviewSessionController) -> Self {
        Self {
            started_at: Utc::now(),
            config: Arc::new(config),
            session: Arc::new(Mutex::new(controller)),
        }
    }
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    model: String,
    orchestrator: String,
}

#[derive(Deserialize)]
struct CurateRequest {
    keywords: String,
    threshold: f64,
}

#[derive(Deserialize)]
struct ReviewRequest {
    clarification_id: String,
    decision: Decision,
    #[serde(default)]
    edited_description: Option<String>,
}

type ViewResponse = (Status, Json<CurationView>);

/// Redirect root to static index.html
#[get("/")]
async fn index_redirect() -> Redirect {
    Redirect::to("/static/index.html")
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        model: state.config.model_runtime.model().to_string(),
        orchestrator: state.config.orchestrator.base_url().to_string(),
    })
}

/// Current session view (re-rendered on every page load).
#[get("/api/v1/session")]
async fn session_view(state: &State<AppState>) -> Json<CurationView> {
    Json(state.session.lock().await.render())
}

#[post("/api/v1/curate", data = "<body>")]
async fn curate(state: &State<AppState>, body: Json<CurateRequest>) -> ViewResponse {
    let mut session = state.session.lock().await;
    let status = match session.submit(&body.keywords, body.threshold).await {
        Ok(()) => Status::Ok,
        Err(e) => Status::from_code(e.status_code()).unwrap_or(Status::InternalServerError),
    };
    (status, Json(session.render()))
}

#[post("/api/v1/review", data = "<body>")]
async fn review(state: &State<AppState>, body: Json<ReviewRequest>) -> ViewResponse {
    let body = body.into_inner();
    let mut session = state.session.lock().await;
    let status = match session
        .review(&body.clarification_id, body.decision, body.edited_description)
        .await
    {
        Ok(()) => Status::Ok,
        Err(e) => Status::from_code(e.status_code()).unwrap_or(Status::InternalServerError),
    };
    (status, Json(session.render()))
}

/// Raw run record of the current run.
#[get("/api/v1/audit")]
async fn audit(state: &State<AppState>) -> Option<Json<serde_json::Value>> {
    state.session.lock().await.audit().map(Json)
}

/// Assemble the Rocket instance with managed state and all routes.
pub fn build_rocket(state: AppState) -> Rocket<Build> {
    let server = &state.config.server;
    let fig = rocket::Config::figment()
        .merge(("address", server.bind().to_string()))
        .merge(("port", server.port()));
    let static_dir = server.static_dir().to_string();

    let rocket = rocket::custom(fig).manage(state).mount(
        "/",
        routes![index_redirect, health, status, session_view, curate, review, audit],
    );

    if Path::new(&static_dir).is_dir() {
        rocket.mount("/static", FileServer::from(static_dir))
    } else {
        tracing::warn!(dir = %static_dir, "static directory not found; UI will not be served");
        rocket
    }
}

/// Build and launch the Rocket server. Blocks until Rocket shuts down.
pub async fn launch_rocket(state: AppState) -> Result<()> {
    tracing::info!(
        bind = state.config.server.bind(),
        port = state.config.server.port(),
        "Starting Rocket HTTP server"
    );
    build_rocket(state)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
