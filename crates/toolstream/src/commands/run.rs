//! One-shot batch execution from a request file.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use serde_json::json;
use tracing::info;

use toolstream::api::ExecuteToolsRequest;
use toolstream::background::BackgroundTasks;
use toolstream::config::Config;
use toolstream::event::BatchEvent;
use toolstream::orchestrator::{ExecutionMode, Orchestrator, first_duplicate_call_id};
use toolstream::tools::{ToolRegistry, create_builtin_tools};

/// Run the batch in `request_path` and print each event as one JSON line on stdout.
///
/// Fails when the request is invalid or any invocation failed.
pub async fn run(
    request_path: &Path,
    config_path: &str,
    mode_override: Option<ExecutionMode>,
) -> Result<()> {
    let config = Config::load(config_path)
        .await
        .with_context(|| format!("failed to load config '{config_path}'"))?;

    let raw = tokio::fs::read_to_string(request_path)
        .await
        .with_context(|| format!("failed to read request '{}'", request_path.display()))?;
    let req: ExecuteToolsRequest = serde_json::from_str(&raw)
        .with_context(|| format!("invalid request '{}'", request_path.display()))?;

    if let Some(duplicate) = first_duplicate_call_id(&req.invocations) {
        bail!("duplicate call_id '{duplicate}' in request");
    }

    let mut options = req.batch_options(config.pipeline.batch_options());
    if let Some(mode) = mode_override {
        options.mode = mode;
    }

    let registry = ToolRegistry::new().register_all(create_builtin_tools(&config.tools.builtins));
    let background_tasks = BackgroundTasks::new();
    let orchestrator =
        Orchestrator::new(Arc::new(registry)).with_background_tasks(background_tasks.clone());

    let mut events = orchestrator.run_batch(req.invocations, req.context, options);
    info!(batch_id = %events.batch_id(), mode = ?options.mode, "Running batch");

    let mut failed = None;
    while let Some(event) = events.next().await {
        if let BatchEvent::BatchEnd(summary) = &event
            && !summary.all_succeeded
        {
            failed = Some((summary.failed, summary.results.len()));
        }
        let line = json!({ "event": event.wire_name(), "data": event.to_json()? });
        println!("{line}");
    }

    background_tasks.shutdown().await;

    if let Some((failed, total)) = failed {
        bail!("{failed} of {total} invocations failed");
    }
    Ok(())
}
