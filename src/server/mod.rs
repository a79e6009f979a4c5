//! HTTP Server module
//!
//! Wires the catalog API and the replay endpoint into one router.

use crate::activity::SharedActivity;
use crate::api::{create_api_router, ApiState};
use crate::catalog::SharedCatalog;
use crate::config::SharedConfig;
use crate::replay::{create_replay_router, ReplayState};
use crate::simulator::SharedCards;
use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    middleware::{self, Next},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Server state
#[derive(Clone)]
pub struct ServerState {
    pub catalog: SharedCatalog,
    pub config: SharedConfig,
    pub activity: SharedActivity,
    pub cards: SharedCards,
}

impl ServerState {
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

/// Request timing middleware
pub async fn timing_middleware(req: Request<Body>, next: Next) -> Response<Body> {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let latency = start.elapsed().as_secs_f64() * 1000.0;
    tracing::debug!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        latency_ms = %latency,
        "Request processed"
    );

    response
}

/// Create the main server router
pub fn create_server_router(state: Arc<ServerState>) -> Router {
    let api_state = Arc::new(ApiState::new(
        state.catalog.clone(),
        state.config.clone(),
        state.activity.clone(),
        state.cards.clone(),
    ));

    let replay_state = Arc::new(ReplayState::new(
        state.catalog.clone(),
        state.config.clone(),
        state.activity.clone(),
    ));

    Router::new()
        .merge(create_api_router(api_state))
        .merge(create_replay_router(replay_state))
        .route("/", get(index_handler))
        .fallback(not_found_handler)
        .layer(middleware::from_fn(timing_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Index handler for root path
async fn index_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        "StatusQuest - browse /api/catalog, search /api/search?q=, replay mocks under /mock",
    )
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({ "error": "no such route" })),
    )
}

/// Start the HTTP server
pub async fn start_server(
    catalog: SharedCatalog,
    config: SharedConfig,
    activity: SharedActivity,
    cards: SharedCards,
) -> anyhow::Result<()> {
    let server_config = config.get().server;
    let addr = format!("{}:{}", server_config.host, server_config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(addr = %addr, entries = catalog.len(), "Starting HTTP server");
    serve(listener, catalog, config, activity, cards).await
}

/// Serve on an already bound listener
pub async fn serve(
    listener: tokio::net::TcpListener,
    catalog: SharedCatalog,
    config: SharedConfig,
    activity: SharedActivity,
    cards: SharedCards,
) -> anyhow::Result<()> {
    let state = Arc::new(ServerState::new(catalog, config, activity, cards));
    let app = create_server_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
