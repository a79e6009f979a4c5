//! Replay module
//!
//! Answers each catalog entry's mock request with its mock response, so the
//! examples can be exercised with a real HTTP client under `/mock`.

use crate::activity::{ActivityKind, SharedActivity};
use crate::catalog::{HttpMethod, SharedCatalog, StatusCodeEntry};
use crate::config::SharedConfig;
use crate::simulator::random_delay;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use std::sync::Arc;

/// Path prefix under which mock routes are served
pub const REPLAY_PREFIX: &str = "/mock";

/// Carries the catalog status when the wire status differs from it
pub const MOCK_STATUS_HEADER: HeaderName = HeaderName::from_static("x-mock-status");

/// Replay state
#[derive(Clone)]
pub struct ReplayState {
    pub catalog: SharedCatalog,
    pub config: SharedConfig,
    pub activity: SharedActivity,
}

impl ReplayState {
    pub fn new(catalog: SharedCatalog, config: SharedConfig, activity: SharedActivity) -> Self {
        Self {
            catalog,
            config,
            activity,
        }
    }
}

/// Router serving `/mock/*path`
pub fn create_replay_router(state: Arc<ReplayState>) -> Router {
    Router::new()
        .route(REPLAY_PREFIX, any(replay_handler))
        .route(&format!("{}/*path", REPLAY_PREFIX), any(replay_handler))
        .with_state(state)
}

/// Replay a mock interaction
pub async fn replay_handler(
    State(state): State<Arc<ReplayState>>,
    req: Request<Body>,
) -> Response {
    let config = state.config.get();
    let method = req.method().to_string();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = match path_and_query.strip_prefix(REPLAY_PREFIX) {
        Some("") | None => "/".to_string(),
        Some(rest) if rest.starts_with('?') => format!("/{}", rest),
        Some(rest) => rest.to_string(),
    };

    if !config.replay.enabled {
        return error_response(StatusCode::NOT_FOUND, "Replay is disabled");
    }

    let entry = HttpMethod::from_request_method(&method)
        .and_then(|m| state.catalog.find_mock_route(m, &target));

    let Some(entry) = entry else {
        state.activity.record(ActivityKind::Replay {
            method: method.clone(),
            path: target.clone(),
            status: None,
        });
        tracing::debug!(method = %method, path = %target, "No mock route");
        return error_response(
            StatusCode::NOT_FOUND,
            &format!("No mock registered for {} {}", method, target),
        );
    };

    if config.replay.simulate_delay {
        let delay = random_delay(&config.simulator.delay_range());
        tokio::time::sleep(delay).await;
    }

    state.activity.record(ActivityKind::Replay {
        method: method.clone(),
        path: target.clone(),
        status: Some(entry.mock.status),
    });
    tracing::info!(
        method = %method,
        path = %target,
        code = entry.code,
        "Replayed mock response"
    );

    mock_response(entry)
}

/// HTTP response equivalent of an entry's mock
///
/// Informational codes cannot end an exchange, so they go out as 200 with the
/// real code in [`MOCK_STATUS_HEADER`]. 204, 205 and 304 carry no body.
pub fn mock_response(entry: &StatusCodeEntry) -> Response {
    let code = entry.mock.status;
    let wire_status = if (100..200).contains(&code) {
        StatusCode::OK
    } else {
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    };

    let mut response = if carries_body(code) {
        Json(entry.mock.response.clone()).into_response()
    } else {
        ().into_response()
    };
    *response.status_mut() = wire_status;
    response
        .headers_mut()
        .insert(MOCK_STATUS_HEADER, HeaderValue::from(code));
    response
}

/// Whether a replayed response for `code` has a body
pub fn carries_body(code: u16) -> bool {
    !matches!(code, 204 | 205 | 304)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
