//! Tool trait for extensible tool execution.
//!
//! Each tool holds its own dependencies (HTTP clients, stores, ...) and knows how
//! to execute itself, so the runner dispatches by name without knowing any tool.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::ToolError;
use crate::invocation::{Arguments, ExecutionContext, ToolOutput};
use crate::relay::ProgressRelay;

/// A tool that can be run by the [`ToolRunner`](super::ToolRunner).
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// Short human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Execute the tool.
    ///
    /// `progress` is present only when streaming is enabled for the batch. A tool may
    /// emit any number of events through it before returning, and must not emit
    /// afterwards: the relay is closed as soon as this future resolves.
    async fn execute(
        &self,
        arguments: &Arguments,
        ctx: &ExecutionContext,
        progress: Option<&ProgressRelay>,
    ) -> Result<ToolOutput, ToolError>;
}

/// Type alias for a shared tool reference.
pub type SharedTool = Arc<dyn Tool>;
