//! Tool listing and batch execution handlers.

use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::api::{ExecuteToolsRequest, ListToolsResponse};
use crate::handlers::problem_details;
use crate::orchestrator::first_duplicate_call_id;
use crate::server::AppState;
use crate::sse::sse_stream;

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/tools
pub async fn list_tools(State(state): State<AppState>) -> Json<ListToolsResponse> {
    Json(ListToolsResponse {
        tools: state.orchestrator.registry().summaries(),
    })
}

/// POST /api/v1/tools/execute
///
/// Runs a batch and streams its events as SSE. Frame names:
/// - `tool_call_start`, `tool_call_complete`: lifecycle of one invocation
/// - `tool_progress`, `tool_log`, `tool_partial_output`, `tool_custom`: events a tool emits
/// - `tools_end`: batch summary, always the last frame
///
/// The batch keeps running if the client disconnects; every invocation finishes.
pub async fn execute_tools(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteToolsRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => {
            return problem_details::problem(rejection.status(), rejection.body_text())
                .into_response();
        }
    };

    if let Some(duplicate) = first_duplicate_call_id(&req.invocations) {
        return problem_details::bad_request(format!("duplicate call_id '{duplicate}'"))
            .into_response();
    }

    let options = req.batch_options(state.pipeline.batch_options());
    let calls = req.invocations.len();
    let events = state
        .orchestrator
        .run_batch(req.invocations, req.context, options);

    debug!(
        batch_id = %events.batch_id(),
        calls,
        mode = ?options.mode,
        streaming = options.streaming,
        "Starting SSE stream"
    );

    let keep_alive = KeepAlive::new()
        .interval(Duration::from_secs(state.keep_alive_interval_seconds))
        .text("keep-alive");

    Sse::new(sse_stream(events)).keep_alive(keep_alive).into_response()
}
