//! V1 API handlers.

mod tools;

pub use tools::{execute_tools, list_tools};
