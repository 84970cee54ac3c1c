//! Shared API types used by the HTTP handlers and the `run` command.
//!
//! These types define the request/response contract of the server.

use serde::{Deserialize, Serialize};

use crate::invocation::{ExecutionContext, Invocation};
use crate::orchestrator::{BatchOptions, ExecutionMode};
use crate::tools::ToolSummary;
use crate::truncation::TruncationPolicy;

// ============================================================================
// SSE Event Names
// ============================================================================

/// SSE event type names used in streaming responses.
pub mod sse {
    pub const TOOL_PROGRESS: &str = "tool_progress";
    pub const TOOL_LOG: &str = "tool_log";
    pub const TOOL_PARTIAL_OUTPUT: &str = "tool_partial_output";
    pub const TOOL_CUSTOM: &str = "tool_custom";
    pub const TOOL_CALL_START: &str = "tool_call_start";
    pub const TOOL_CALL_COMPLETE: &str = "tool_call_complete";
    pub const TOOLS_END: &str = "tools_end";
}

// ============================================================================
// Tool Types
// ============================================================================

/// Response for `GET /api/v1/tools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResponse {
    pub tools: Vec<ToolSummary>,
}

/// Body of `POST /api/v1/tools/execute`.
///
/// Unset fields fall back to the server's `pipeline` configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteToolsRequest {
    pub invocations: Vec<Invocation>,
    #[serde(default)]
    pub context: ExecutionContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecutionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_result_size: Option<usize>,
}

impl ExecuteToolsRequest {
    /// Apply the fields this request sets on top of `defaults`.
    pub fn batch_options(&self, defaults: BatchOptions) -> BatchOptions {
        let mut options = defaults;
        if let Some(mode) = self.mode {
            options.mode = mode;
        }
        if let Some(streaming) = self.streaming {
            options.streaming = streaming;
        }
        if let Some(max_size) = self.max_result_size {
            options.truncation = TruncationPolicy::new(max_size);
        }
        options
    }
}
