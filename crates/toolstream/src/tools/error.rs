use thiserror::Error;

use crate::relay::RelayError;

/// Why a tool invocation failed.
///
/// Every variant is reported on the failing invocation only; none aborts the batch.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("tool panicked: {0}")]
    Panicked(String),

    #[error("failed to serialize tool output: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl ToolError {
    /// Build an `InvalidArguments` error from a deserialization failure.
    pub fn invalid_arguments(err: impl std::fmt::Display) -> Self {
        Self::InvalidArguments(err.to_string())
    }
}
