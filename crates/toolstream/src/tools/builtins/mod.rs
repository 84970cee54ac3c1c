//! Built-in tool implementations.

pub mod echo;
pub mod wait;
