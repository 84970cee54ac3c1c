//! Wait tool: sleeps in slices and reports progress after each one.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::invocation::{Arguments, ExecutionContext, ToolOutput};
use crate::relay::ProgressRelay;
use crate::tools::error::ToolError;
use crate::tools::tool::Tool;

/// Upper bound on a single wait.
const MAX_WAIT_MS: u64 = 60_000;

#[derive(Debug, Deserialize)]
struct WaitArgs {
    #[serde(default)]
    ms: u64,
    #[serde(default = "default_steps")]
    steps: u32,
}

fn default_steps() -> u32 {
    1
}

pub struct WaitTool;

#[async_trait]
impl Tool for WaitTool {
    fn name(&self) -> &str {
        "wait"
    }

    fn description(&self) -> &str {
        "Sleep for `ms` milliseconds split into `steps` slices, reporting progress after each slice."
    }

    async fn execute(
        &self,
        arguments: &Arguments,
        _ctx: &ExecutionContext,
        progress: Option<&ProgressRelay>,
    ) -> Result<ToolOutput, ToolError> {
        let args: WaitArgs = serde_json::from_value(serde_json::Value::Object(arguments.clone()))
            .map_err(ToolError::invalid_arguments)?;

        let total_ms = args.ms.min(MAX_WAIT_MS);
        let steps = args.steps.max(1);
        let slice = Duration::from_millis(total_ms / u64::from(steps));

        for step in 1..=steps {
            tokio::time::sleep(slice).await;
            if let Some(relay) = progress {
                let percent = f64::from(step) * 100.0 / f64::from(steps);
                if let Err(e) = relay
                    .progress(percent, format!("step {step}/{steps}"))
                    .await
                {
                    debug!(error = %e, "Progress not delivered");
                }
            }
        }

        Ok(ToolOutput::Json(json!({ "waited_ms": total_ms, "steps": steps })))
    }
}
