//! Common test utilities.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use futures::StreamExt;
use serde_json::Value;

use toolstream::background::BackgroundTasks;
use toolstream::config::PipelineConfig;
use toolstream::event::{BatchEvent, BatchSummary};
use toolstream::invocation::{Arguments, ExecutionContext, ToolOutput};
use toolstream::orchestrator::{BatchStream, Orchestrator};
use toolstream::relay::ProgressRelay;
use toolstream::server::{self, AppState};
use toolstream::tools::{Tool, ToolError, ToolRegistry, create_builtin_tools};

// ============================================================================
// Test Tools
// ============================================================================

fn u64_arg(arguments: &Arguments, name: &str, default: u64) -> u64 {
    arguments.get(name).and_then(Value::as_u64).unwrap_or(default)
}

/// Sleeps for `ms`, then returns `"slept"`.
pub struct SleepTool;

#[async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn execute(
        &self,
        arguments: &Arguments,
        _ctx: &ExecutionContext,
        _progress: Option<&ProgressRelay>,
    ) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(Duration::from_millis(u64_arg(arguments, "ms", 0))).await;
        Ok(ToolOutput::from("slept"))
    }
}

/// Fails immediately.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "failing"
    }

    async fn execute(
        &self,
        _arguments: &Arguments,
        _ctx: &ExecutionContext,
        _progress: Option<&ProgressRelay>,
    ) -> Result<ToolOutput, ToolError> {
        Err(ToolError::ExecutionFailed("boom".to_string()))
    }
}

/// Emits `count` progress events (`step 1/n` ...), sleeping `ms` before each.
pub struct ChattyTool;

#[async_trait]
impl Tool for ChattyTool {
    fn name(&self) -> &str {
        "chatty"
    }

    async fn execute(
        &self,
        arguments: &Arguments,
        _ctx: &ExecutionContext,
        progress: Option<&ProgressRelay>,
    ) -> Result<ToolOutput, ToolError> {
        let count = u64_arg(arguments, "count", 2);
        let ms = u64_arg(arguments, "ms", 0);
        for i in 1..=count {
            if ms > 0 {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            if let Some(relay) = progress {
                relay
                    .progress(i as f64 * 100.0 / count as f64, format!("step {i}/{count}"))
                    .await?;
            }
        }
        Ok(ToolOutput::from(format!("emitted {count}")))
    }
}

/// Returns a text of `size` characters.
pub struct BigTool;

#[async_trait]
impl Tool for BigTool {
    fn name(&self) -> &str {
        "big"
    }

    async fn execute(
        &self,
        arguments: &Arguments,
        _ctx: &ExecutionContext,
        _progress: Option<&ProgressRelay>,
    ) -> Result<ToolOutput, ToolError> {
        let size = u64_arg(arguments, "size", 50_000) as usize;
        Ok(ToolOutput::Text("x".repeat(size)))
    }
}

pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn execute(
        &self,
        _arguments: &Arguments,
        _ctx: &ExecutionContext,
        _progress: Option<&ProgressRelay>,
    ) -> Result<ToolOutput, ToolError> {
        panic!("tool bug");
    }
}

/// Emits `count` progress events, propagating relay errors, then sleeps `ms`
/// and counts itself as finished. Models a side-effecting tool that must complete.
pub struct SideEffectTool {
    pub finished: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for SideEffectTool {
    fn name(&self) -> &str {
        "side_effect"
    }

    async fn execute(
        &self,
        arguments: &Arguments,
        _ctx: &ExecutionContext,
        progress: Option<&ProgressRelay>,
    ) -> Result<ToolOutput, ToolError> {
        let count = u64_arg(arguments, "count", 0);
        if let Some(relay) = progress {
            for i in 0..count {
                relay.progress(i as f64, "working").await?;
            }
        }
        tokio::time::sleep(Duration::from_millis(u64_arg(arguments, "ms", 0))).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(ToolOutput::from("placed"))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Registry with every test tool and the builtins.
pub fn test_registry(finished: Arc<AtomicUsize>) -> Arc<ToolRegistry> {
    let builtins = create_builtin_tools(&["echo".to_string(), "wait".to_string()]);
    Arc::new(
        ToolRegistry::new()
            .register_all(builtins)
            .register(Arc::new(SleepTool))
            .register(Arc::new(FailingTool))
            .register(Arc::new(ChattyTool))
            .register(Arc::new(BigTool))
            .register(Arc::new(PanickingTool))
            .register(Arc::new(SideEffectTool { finished })),
    )
}

pub fn test_orchestrator() -> Orchestrator {
    Orchestrator::new(test_registry(Arc::new(AtomicUsize::new(0))))
}

/// Create a test `AppState` with sensible defaults.
pub fn test_app_state() -> AppState {
    let background_tasks = BackgroundTasks::new();
    AppState {
        orchestrator: test_orchestrator().with_background_tasks(background_tasks.clone()),
        pipeline: PipelineConfig::default(),
        keep_alive_interval_seconds: 15,
        background_tasks,
    }
}

/// Create a test app with the test tools registered.
pub fn test_app() -> Router {
    server::build_app(test_app_state(), 300)
}

// ============================================================================
// Stream Helpers
// ============================================================================

pub async fn collect(stream: BatchStream) -> Vec<BatchEvent> {
    stream.collect().await
}

/// Wire names of the events, in order.
pub fn names(events: &[BatchEvent]) -> Vec<&'static str> {
    events.iter().map(BatchEvent::wire_name).collect()
}

/// The terminal summary. Panics unless it is the last event.
pub fn summary(events: &[BatchEvent]) -> &BatchSummary {
    match events.last() {
        Some(BatchEvent::BatchEnd(summary)) => summary,
        other => panic!("expected tools_end as last event, got {other:?}"),
    }
}

/// Events that belong to `call_id`, as wire names.
pub fn names_for(events: &[BatchEvent], call_id: &str) -> Vec<&'static str> {
    events
        .iter()
        .filter(|e| e.call_id() == Some(call_id))
        .map(BatchEvent::wire_name)
        .collect()
}
