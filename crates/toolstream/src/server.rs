use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;

use crate::background::BackgroundTasks;
use crate::config::PipelineConfig;
use crate::handlers;
use crate::orchestrator::Orchestrator;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    /// Batch defaults; request fields override them.
    pub pipeline: PipelineConfig,
    pub keep_alive_interval_seconds: u64,
    pub background_tasks: BackgroundTasks,
}

// ============================================================================
// Server Setup
// ============================================================================

pub fn build_app(state: AppState, request_timeout_seconds: u64) -> Router {
    // SSE streaming routes - no request timeout (a batch runs as long as its tools)
    let streaming_routes = Router::new()
        .route("/tools/execute", post(handlers::v1::execute_tools))
        .with_state(state.clone());

    // Regular API routes - with request timeout
    let api_routes = Router::new()
        .route("/tools", get(handlers::v1::list_tools))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_seconds),
        ));

    let api_v1 = Router::new()
        .merge(streaming_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024)); // 2 MB

    Router::new()
        .route("/livez", get(handlers::livez))
        .nest("/api/v1", api_v1)
}
