//! HTTP surface for the explorer UI.
//!
//! - `GET  /health`
//! - `GET  /api/events`   filtered view of the latest events file
//! - `GET  /api/summary`  summary panel only
//! - `POST /api/run`      blocking fetch → classify → store, then reload
//! - everything else falls through to the static UI directory (if configured)

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::analyze::DynLlmClient;
use crate::event::{EventType, Impact, Region};
use crate::explore::{self, EventFilter, ExploreView, SortKey, SortOrder, Summary, TimeWindow};
use crate::ingest::types::TweetSource;
use crate::pipeline::{self, PipelineError, RunReport};
use crate::store::EventStore;

/// Fetcher + classifier pair used by `POST /api/run`.
#[derive(Clone)]
pub struct Runner {
    pub source: Arc<dyn TweetSource>,
    pub classifier: DynLlmClient,
}

#[derive(Clone)]
pub struct AppState {
    pub store: EventStore,
    /// `None` when credentials are missing; the explorer stays read-only.
    pub runner: Option<Runner>,
    pub default_username: String,
    pub default_limit: usize,
    run_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(store: EventStore, default_username: impl Into<String>, default_limit: usize) -> Self {
        Self {
            store,
            runner: None,
            default_username: default_username.into(),
            default_limit,
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn with_runner(mut self, runner: Runner) -> Self {
        self.runner = Some(runner);
        self
    }
}

pub fn create_router(state: AppState, ui_dir: Option<PathBuf>) -> Router {
    let mut router = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/events", get(get_events))
        .route("/api/summary", get(get_summary))
        .route("/api/run", post(run_pipeline));

    if let Some(dir) = ui_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ------------------------------------------------------------
// Errors
// ------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        tracing::error!(target: "api", error = ?err, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let status = match e {
            PipelineError::InvalidUsername(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ------------------------------------------------------------
// Query parsing
// ------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub window: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub day: Option<String>,
    pub impact: Option<String>,
    pub event_type: Option<String>,
    pub region: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

/// Comma-separated list; blank entries ignored, unknown values rejected.
fn parse_list<T>(raw: Option<&str>) -> Result<Vec<T>, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(|e| ApiError::bad_request(e.to_string())))
        .collect()
}

fn parse_ts(raw: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| ApiError::bad_request(format!("invalid {field}: {e}"))),
    }
}

impl EventsQuery {
    pub fn to_filter(&self) -> Result<EventFilter, ApiError> {
        let window = match self.window.as_deref() {
            Some(w) => w.parse::<TimeWindow>().map_err(ApiError::bad_request)?,
            None => TimeWindow::All,
        };
        let day = match self.day.as_deref().map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
            Some(d) => Some(
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|e| ApiError::bad_request(format!("invalid day: {e}")))?,
            ),
            None => None,
        };
        Ok(EventFilter::default()
            .with_window(window)
            .with_range(
                parse_ts(self.from.as_deref(), "from")?,
                parse_ts(self.to.as_deref(), "to")?,
            )
            .with_day(day)
            .with_impacts(parse_list::<Impact>(self.impact.as_deref())?)
            .with_event_types(parse_list::<EventType>(self.event_type.as_deref())?)
            .with_regions(parse_list::<Region>(self.region.as_deref())?))
    }

    pub fn sort(&self) -> Result<(SortKey, SortOrder), ApiError> {
        let key = self
            .sort
            .as_deref()
            .unwrap_or_default()
            .parse::<SortKey>()
            .map_err(ApiError::bad_request)?;
        let order = self
            .order
            .as_deref()
            .unwrap_or_default()
            .parse::<SortOrder>()
            .map_err(ApiError::bad_request)?;
        Ok((key, order))
    }
}

// ------------------------------------------------------------
// Handlers
// ------------------------------------------------------------

#[derive(Serialize)]
struct EventsResp {
    file: Option<String>,
    #[serde(flatten)]
    view: ExploreView,
}

fn load_view(state: &AppState, q: &EventsQuery) -> Result<EventsResp, ApiError> {
    let filter = q.to_filter()?;
    let (sort, order) = q.sort()?;
    let loaded = state.store.load_latest().map_err(ApiError::internal)?;
    let (file, all) = match loaded {
        Some((path, events)) => (Some(path.display().to_string()), events),
        None => (None, Vec::new()),
    };
    Ok(EventsResp {
        file,
        view: explore::build_view(&all, &filter, sort, order),
    })
}

async fn get_events(
    State(state): State<AppState>,
    Query(q): Query<EventsQuery>,
) -> Result<Json<EventsResp>, ApiError> {
    load_view(&state, &q).map(Json)
}

async fn get_summary(
    State(state): State<AppState>,
    Query(q): Query<EventsQuery>,
) -> Result<Json<Summary>, ApiError> {
    load_view(&state, &q).map(|r| Json(r.view.summary))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunReq {
    username: Option<String>,
    max_tweets: Option<usize>,
}

async fn run_pipeline(
    State(state): State<AppState>,
    Json(req): Json<RunReq>,
) -> Result<Json<RunReport>, ApiError> {
    let Some(runner) = state.runner.clone() else {
        return Err(ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "pipeline is not configured (missing X_BEARER_TOKEN / OPENAI_API_KEY)".into(),
        });
    };
    let username = req.username.unwrap_or_else(|| state.default_username.clone());
    let max = req.max_tweets.unwrap_or(state.default_limit);

    let _guard = state.run_lock.lock().await;
    tracing::info!(target: "api", %username, max, "pipeline run requested");
    let report = pipeline::execute_pipeline(
        runner.source.as_ref(),
        runner.classifier.as_ref(),
        &state.store,
        &username,
        max,
        Utc::now(),
    )
    .await?;
    Ok(Json(report))
}
