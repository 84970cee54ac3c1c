//! Tool execution for batch invocations.
//!
//! Tools are self-contained implementations of the [`Tool`] trait, looked up by
//! name in a [`ToolRegistry`] and executed by a [`ToolRunner`].

mod builtins;
mod error;
mod factory;
mod registry;
mod runner;
mod tool;

pub use error::ToolError;
pub use factory::{KNOWN_BUILTIN_TOOLS, create_builtin_tools};
pub use registry::{ToolRegistry, ToolSummary};
pub use runner::ToolRunner;
pub use tool::{SharedTool, Tool};
