//! Event types for the tool execution stream.
//!
//! Two sources feed one stream:
//! - Tool-sourced events (`ToolEvent`), emitted through a progress relay while a tool runs
//! - Orchestrator-sourced lifecycle events (call start, call complete, batch end)
//!
//! Each event maps to one named SSE frame. Tool events are named `tool_<kind>`;
//! lifecycle events use the fixed names in [`crate::api::sse`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::sse as sse_events;
use crate::invocation::{Invocation, InvocationResult};

// ============================================================================
// Tool Events
// ============================================================================

/// Severity of a tool log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// What happened inside a running tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Progress towards completion, as a percentage in `0.0..=100.0`.
    Progress { percent: f64, message: String },
    /// A log line the tool wants surfaced to the caller.
    Log { level: LogLevel, message: String },
    /// A piece of output produced before the final result.
    PartialOutput { chunk: String, is_final: bool },
    /// Tool-specific event the pipeline does not interpret.
    Custom {
        tag: String,
        payload: serde_json::Value,
    },
}

impl EventKind {
    /// SSE frame name for this kind (`"tool_" + kind`).
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => sse_events::TOOL_PROGRESS,
            Self::Log { .. } => sse_events::TOOL_LOG,
            Self::PartialOutput { .. } => sse_events::TOOL_PARTIAL_OUTPUT,
            Self::Custom { .. } => sse_events::TOOL_CUSTOM,
        }
    }
}

/// An event emitted by a tool while it runs.
///
/// Fields are private: an event is fixed at construction and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    call_id: String,
    tool_name: String,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    kind: EventKind,
}

impl ToolEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>, kind: EventKind) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }
}

// ============================================================================
// Lifecycle Events
// ============================================================================

/// An invocation has started executing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStart {
    pub call_id: String,
    pub tool_name: String,
    pub timestamp: DateTime<Utc>,
}

impl CallStart {
    #[must_use]
    pub fn for_invocation(invocation: &Invocation) -> Self {
        Self {
            call_id: invocation.call_id.clone(),
            tool_name: invocation.tool_name.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// An invocation has produced its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallComplete {
    #[serde(flatten)]
    pub result: InvocationResult,
    pub timestamp: DateTime<Utc>,
}

impl CallComplete {
    #[must_use]
    pub fn new(result: InvocationResult) -> Self {
        Self {
            result,
            timestamp: Utc::now(),
        }
    }
}

/// Terminal summary of one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    /// One result per submitted invocation, in submission order.
    pub results: Vec<InvocationResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub all_succeeded: bool,
    pub timestamp: DateTime<Utc>,
}

impl BatchSummary {
    /// Derive counts from the final results.
    #[must_use]
    pub fn from_results(batch_id: impl Into<String>, results: Vec<InvocationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;
        Self {
            batch_id: batch_id.into(),
            results,
            succeeded,
            failed,
            all_succeeded: failed == 0,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Batch Stream Items
// ============================================================================

/// One element of the orchestrator's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    CallStart(CallStart),
    Tool(ToolEvent),
    CallComplete(CallComplete),
    BatchEnd(BatchSummary),
}

impl BatchEvent {
    /// SSE frame name. The layer above depends on these exact names.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::CallStart(_) => sse_events::TOOL_CALL_START,
            Self::Tool(event) => event.kind().wire_name(),
            Self::CallComplete(_) => sse_events::TOOL_CALL_COMPLETE,
            Self::BatchEnd(_) => sse_events::TOOLS_END,
        }
    }

    /// Correlation id of the invocation this event belongs to, if any.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::CallStart(start) => Some(&start.call_id),
            Self::Tool(event) => Some(event.call_id()),
            Self::CallComplete(complete) => Some(&complete.result.call_id),
            Self::BatchEnd(_) => None,
        }
    }

    /// JSON body carried in the SSE `data` field.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::CallStart(start) => serde_json::to_value(start),
            Self::Tool(event) => serde_json::to_value(event),
            Self::CallComplete(complete) => serde_json::to_value(complete),
            Self::BatchEnd(summary) => serde_json::to_value(summary),
        }
    }
}
