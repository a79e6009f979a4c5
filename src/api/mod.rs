//! Catalog API module
//!
//! JSON endpoints for browsing, searching and looking up status codes, Try Now
//! cards, the activity log and runtime configuration.

use crate::activity::{ActivityEvent, ActivityKind, ActivitySummary, SharedActivity};
use crate::catalog::{LookupError, SharedCatalog, StatusCodeEntry, StatusCodeGroup};
use crate::config::{AppConfig, SharedConfig, SimulatorConfig};
use crate::search::{search, SearchOutcome};
use crate::simulator::{SharedCards, SimulatorError};
use crate::view::{render_json_lines, CardView, Line};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// API state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    pub catalog: SharedCatalog,
    pub config: SharedConfig,
    pub activity: SharedActivity,
    pub cards: SharedCards,
}

impl ApiState {
    pub fn new(
        catalog: SharedCatalog,
        config: SharedConfig,
        activity: SharedActivity,
        cards: SharedCards,
    ) -> Self {
        Self {
            catalog,
            config,
            activity,
            cards,
        }
    }
}

/// Create the API router
pub fn create_api_router(state: Arc<ApiState>) -> Router {
    Router::new()
        // Catalog endpoints
        .route("/api/catalog", get(get_catalog))
        .route("/api/search", get(search_catalog))
        .route("/api/codes/:code", get(get_code))
        .route("/api/codes/:code/card", get(get_code_card))
        // Try Now cards
        .route("/api/cards", post(open_card))
        .route("/api/cards/:id", get(get_card).delete(close_card))
        .route("/api/cards/:id/try", post(try_card))
        .route("/api/cards/:id/response", get(get_card_response))
        // Activity endpoints
        .route("/api/activity", get(get_activity))
        .route("/api/activity/summary", get(get_activity_summary))
        .route("/api/activity/recent", get(get_recent_activity))
        .route("/api/activity/clear", post(clear_activity))
        // Configuration endpoints
        .route("/api/config", get(get_config))
        .route(
            "/api/config/simulator",
            get(get_simulator_config).put(update_simulator_config),
        )
        // Health check
        .route("/api/health", get(health_check))
        .with_state(state)
}

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        error_response(StatusCode::NOT_FOUND, &self.to_string())
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn card_not_found(id: &Uuid) -> Response {
    error_response(StatusCode::NOT_FOUND, &format!("card {} not found", id))
}

/// Get the full grouped catalog
async fn get_catalog(State(state): State<Arc<ApiState>>) -> Response {
    Json(state.catalog.as_ref()).into_response()
}

/// Search query parameters
#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// Search response: the grouped catalog for an empty query, rendered cards
/// otherwise
#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchResponse<'a> {
    Grouped {
        groups: &'a [StatusCodeGroup],
    },
    Matches {
        query: String,
        total: usize,
        cards: Vec<CardView>,
    },
}

/// Search the catalog
async fn search_catalog(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let response = match search(&state.catalog, &params.q) {
        SearchOutcome::Grouped { groups } => SearchResponse::Grouped { groups },
        SearchOutcome::Matches { query, entries } => {
            state.activity.record(ActivityKind::Search {
                query: query.clone(),
                hits: entries.len(),
            });
            tracing::debug!(query = %query, hits = entries.len(), "Search");

            let cards = entries
                .iter()
                .map(|entry| CardView::render(entry, &query))
                .collect::<Vec<_>>();
            SearchResponse::Matches {
                query,
                total: cards.len(),
                cards,
            }
        }
    };
    Json(response).into_response()
}

/// Look up a single status code
async fn get_code(
    State(state): State<Arc<ApiState>>,
    Path(code): Path<String>,
) -> Result<Json<StatusCodeEntry>, LookupError> {
    let entry = lookup(&state, &code)?;
    Ok(Json(entry.clone()))
}

/// Render a single status code as a card
async fn get_code_card(
    State(state): State<Arc<ApiState>>,
    Path(code): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<CardView>, LookupError> {
    let entry = lookup(&state, &code)?;
    Ok(Json(CardView::render(entry, &params.q)))
}

/// Detail lookup that records the outcome
fn lookup<'a>(state: &'a ApiState, segment: &str) -> Result<&'a StatusCodeEntry, LookupError> {
    let result = state.catalog.lookup_segment(segment);
    match &result {
        Ok(entry) => state.activity.record(ActivityKind::Lookup {
            code: entry.code,
            found: true,
        }),
        Err(LookupError::NotFound(code)) => state.activity.record(ActivityKind::Lookup {
            code: *code,
            found: false,
        }),
        Err(LookupError::InvalidCode(_)) => {}
    }
    result
}

/// Open card request
#[derive(Debug, Deserialize)]
pub struct OpenCardRequest {
    pub code: u16,
}

/// Open card response
#[derive(Debug, Serialize)]
pub struct OpenCardResponse {
    pub id: Uuid,
    pub code: u16,
}

/// Open a Try Now card for a status code
async fn open_card(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<OpenCardRequest>,
) -> Result<(StatusCode, Json<OpenCardResponse>), LookupError> {
    let id = state.cards.open(req.code)?;
    Ok((
        StatusCode::CREATED,
        Json(OpenCardResponse { id, code: req.code }),
    ))
}

/// Get a card's simulation state
async fn get_card(State(state): State<Arc<ApiState>>, Path(id): Path<Uuid>) -> Response {
    match state.cards.snapshot(&id) {
        Some(snapshot) => Json(snapshot).into_response(),
        None => card_not_found(&id),
    }
}

/// Close a card, cancelling its simulation
async fn close_card(State(state): State<Arc<ApiState>>, Path(id): Path<Uuid>) -> Response {
    if state.cards.close(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        card_not_found(&id)
    }
}

/// Try Now: start a simulated request on a card
async fn try_card(State(state): State<Arc<ApiState>>, Path(id): Path<Uuid>) -> Response {
    if state.cards.trigger(&id).is_none() {
        return card_not_found(&id);
    }
    match state.cards.snapshot(&id) {
        Some(snapshot) => (StatusCode::ACCEPTED, Json(snapshot)).into_response(),
        None => card_not_found(&id),
    }
}

/// Loaded simulation response
#[derive(Debug, Serialize)]
pub struct CardResponse {
    pub id: Uuid,
    pub code: u16,
    pub response: Value,
    /// Pretty-printed response, highlighted for `q`
    pub lines: Vec<Line>,
}

/// Wait for a card's simulated response
async fn get_card_response(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<SearchParams>,
) -> Response {
    let Some(simulator) = state.cards.get(&id) else {
        return card_not_found(&id);
    };

    match simulator.wait_for_response().await {
        Ok(response) => Json(CardResponse {
            id,
            code: simulator.code(),
            lines: render_json_lines(&response, &params.q),
            response,
        })
        .into_response(),
        Err(SimulatorError::Idle) => {
            error_response(StatusCode::CONFLICT, &SimulatorError::Idle.to_string())
        }
        Err(e) => error_response(StatusCode::GONE, &e.to_string()),
    }
}

/// Get all activity events
async fn get_activity(State(state): State<Arc<ApiState>>) -> Json<Vec<ActivityEvent>> {
    Json(state.activity.get_all())
}

/// Get activity summary
async fn get_activity_summary(State(state): State<Arc<ApiState>>) -> Json<ActivitySummary> {
    Json(state.activity.get_summary())
}

/// Query parameters for recent activity
#[derive(Debug, Deserialize, Default)]
pub struct RecentActivityQuery {
    #[serde(default = "default_seconds")]
    pub seconds: i64,
}

fn default_seconds() -> i64 {
    60
}

/// Get recent activity
async fn get_recent_activity(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<RecentActivityQuery>,
) -> Json<Vec<ActivityEvent>> {
    Json(state.activity.get_recent(query.seconds))
}

/// Clear the activity log
async fn clear_activity(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    state.activity.clear();
    (StatusCode::OK, "Activity cleared")
}

/// Get current configuration
async fn get_config(State(state): State<Arc<ApiState>>) -> Json<AppConfig> {
    Json(state.config.get())
}

/// Get simulator configuration
async fn get_simulator_config(State(state): State<Arc<ApiState>>) -> Json<SimulatorConfig> {
    Json(state.config.simulator())
}

/// Update simulator configuration
#[derive(Debug, Deserialize)]
pub struct UpdateSimulatorRequest {
    pub min_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// Applies to cards opened afterwards and to replayed responses
async fn update_simulator_config(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<UpdateSimulatorRequest>,
) -> impl IntoResponse {
    let mut current = state.config.simulator();

    if let Some(min_delay_ms) = req.min_delay_ms {
        current.min_delay_ms = min_delay_ms;
    }
    if let Some(max_delay_ms) = req.max_delay_ms {
        current.max_delay_ms = max_delay_ms;
    }

    state.config.update_simulator(current);
    (StatusCode::OK, "Simulator configuration updated")
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub entries: usize,
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        entries: state.catalog.len(),
    })
}
