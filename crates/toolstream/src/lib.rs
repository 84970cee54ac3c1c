//! Toolstream - batch tool execution with multiplexed progress and lifecycle event streaming.

// ============================================================================
// Core Infrastructure
// ============================================================================

pub mod background;
pub mod config;

// ============================================================================
// Server & HTTP
// ============================================================================

pub mod api;
pub mod handlers;
pub mod server;
pub mod sse;

// ============================================================================
// Domain
// ============================================================================

pub mod event;
pub mod invocation;
pub mod orchestrator;
pub mod relay;
pub mod tools;
pub mod truncation;
