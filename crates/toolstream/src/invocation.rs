//! Invocation and result types exchanged between the caller, the runner and the orchestrator.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered mapping of parameter name to value.
pub type Arguments = serde_json::Map<String, Value>;

// ============================================================================
// Invocation
// ============================================================================

/// A request to run one named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Correlation id, unique within a batch.
    pub call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl Invocation {
    #[must_use]
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments: Arguments::new(),
        }
    }

    /// Add an argument, keeping insertion order.
    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }
}

/// Who a batch runs on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

// ============================================================================
// Tool Output
// ============================================================================

/// Raw output returned by a tool.
///
/// The pipeline only needs to turn an output into its wire form; it never looks
/// inside `Json` or `Opaque` payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Plain text.
    Text(String),
    /// A structured value.
    Json(Value),
    /// The last chunk of a streamed output.
    Partial { chunk: String, is_final: bool },
    /// Tool-specific bytes, forwarded as base64.
    Opaque(Vec<u8>),
}

impl ToolOutput {
    /// Serialize to the canonical wire representation.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Text(text) => Ok(text.clone()),
            Self::Json(value) => serde_json::to_string(value),
            Self::Partial { chunk, .. } => Ok(chunk.clone()),
            Self::Opaque(bytes) => Ok(BASE64.encode(bytes)),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

// ============================================================================
// Invocation Result
// ============================================================================

/// Either the wire payload of a successful call or a failure description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultBody {
    Payload(String),
    Error(String),
}

/// The single result produced for an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub call_id: String,
    pub tool_name: String,
    pub success: bool,
    #[serde(flatten)]
    pub body: ResultBody,
    /// The truncation safety net cut the body.
    pub was_truncated: bool,
    pub elapsed_ms: u64,
}

impl InvocationResult {
    #[must_use]
    pub fn succeeded(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        payload: impl Into<String>,
        was_truncated: bool,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            success: true,
            body: ResultBody::Payload(payload.into()),
            was_truncated,
            elapsed_ms,
        }
    }

    #[must_use]
    pub fn failed(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: impl Into<String>,
        was_truncated: bool,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            success: false,
            body: ResultBody::Error(error.into()),
            was_truncated,
            elapsed_ms,
        }
    }

    pub fn payload(&self) -> Option<&str> {
        match &self.body {
            ResultBody::Payload(payload) => Some(payload),
            ResultBody::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.body {
            ResultBody::Payload(_) => None,
            ResultBody::Error(error) => Some(error),
        }
    }
}
