//! Creates builtin tools from configuration.

use std::sync::Arc;

use tracing::warn;

use super::builtins::echo::EchoTool;
use super::builtins::wait::WaitTool;
use super::tool::SharedTool;

/// All recognized builtin tool names.
pub const KNOWN_BUILTIN_TOOLS: &[&str] = &["echo", "wait"];

/// Create the named builtin tools, skipping unknown names with a warning.
pub fn create_builtin_tools(names: &[String]) -> Vec<SharedTool> {
    names
        .iter()
        .filter_map(|name| create_builtin_tool(name))
        .collect()
}

fn create_builtin_tool(name: &str) -> Option<SharedTool> {
    match name {
        "echo" => Some(Arc::new(EchoTool)),
        "wait" => Some(Arc::new(WaitTool)),
        other => {
            warn!(tool = %other, known = ?KNOWN_BUILTIN_TOOLS, "Unknown builtin tool, skipping");
            None
        }
    }
}
