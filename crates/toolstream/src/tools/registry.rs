//! Name-to-tool lookup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::tool::SharedTool;

/// Name and description of a registered tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

/// Registry of available tools, keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, SharedTool>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single tool. A tool with the same name is replaced.
    #[must_use]
    pub fn register(mut self, tool: SharedTool) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Register multiple tools.
    #[must_use]
    pub fn register_all(mut self, tools: Vec<SharedTool>) -> Self {
        for tool in tools {
            self.tools.insert(tool.name().to_string(), tool);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&SharedTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Summaries of all tools, sorted by name.
    pub fn summaries(&self) -> Vec<ToolSummary> {
        let mut summaries: Vec<ToolSummary> = self
            .tools
            .values()
            .map(|tool| ToolSummary {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
