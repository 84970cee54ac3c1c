//! Runs one invocation and turns whatever happens into exactly one result.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, info, warn};

use super::error::ToolError;
use super::registry::ToolRegistry;
use crate::invocation::{ExecutionContext, Invocation, InvocationResult, ToolOutput};
use crate::relay::ProgressRelay;
use crate::truncation::{TruncationPolicy, truncate_result};

/// Executes invocations against a registry under one truncation policy.
#[derive(Clone)]
pub struct ToolRunner {
    registry: Arc<ToolRegistry>,
    policy: TruncationPolicy,
}

impl ToolRunner {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, policy: TruncationPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> TruncationPolicy {
        self.policy
    }

    /// Run one invocation.
    ///
    /// Never fails: unknown tools, tool errors and panics all become a failed
    /// [`InvocationResult`]. The relay, if any, is closed before this returns.
    pub async fn run(
        &self,
        invocation: &Invocation,
        ctx: &ExecutionContext,
        relay: Option<ProgressRelay>,
    ) -> InvocationResult {
        let started = Instant::now();
        let outcome = self.execute(invocation, ctx, relay.as_ref()).await;
        if let Some(relay) = &relay {
            relay.close();
        }
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome.and_then(|output| output.to_wire().map_err(ToolError::from)) {
            Ok(wire) => {
                let (payload, was_truncated) = truncate_result(&wire, self.policy);
                if was_truncated {
                    info!(
                        call_id = %invocation.call_id,
                        tool = %invocation.tool_name,
                        original_len = wire.len(),
                        max_size = self.policy.max_size,
                        "Tool result truncated"
                    );
                }
                debug!(
                    call_id = %invocation.call_id,
                    tool = %invocation.tool_name,
                    elapsed_ms,
                    "Tool succeeded"
                );
                InvocationResult::succeeded(
                    &invocation.call_id,
                    &invocation.tool_name,
                    payload,
                    was_truncated,
                    elapsed_ms,
                )
            }
            Err(e) => {
                warn!(
                    call_id = %invocation.call_id,
                    tool = %invocation.tool_name,
                    elapsed_ms,
                    error = %e,
                    "Tool failed"
                );
                let (error, was_truncated) = truncate_result(&e.to_string(), self.policy);
                InvocationResult::failed(
                    &invocation.call_id,
                    &invocation.tool_name,
                    error,
                    was_truncated,
                    elapsed_ms,
                )
            }
        }
    }

    async fn execute(
        &self,
        invocation: &Invocation,
        ctx: &ExecutionContext,
        relay: Option<&ProgressRelay>,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .registry
            .get(&invocation.tool_name)
            .ok_or_else(|| ToolError::NotFound(invocation.tool_name.clone()))?;

        debug!(
            call_id = %invocation.call_id,
            tool = %invocation.tool_name,
            streaming = relay.is_some(),
            "Executing tool"
        );

        AssertUnwindSafe(tool.execute(&invocation.arguments, ctx, relay))
            .catch_unwind()
            .await
            .map_err(|panic| ToolError::Panicked(panic_message(panic.as_ref())))?
    }
}

/// Extract the message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::event::EventKind;
    use crate::invocation::Arguments;
    use crate::relay::{self, RelayError};
    use crate::tools::Tool;
    use crate::truncation::TRUNCATION_MARKER;

    // ------------------------------------------------------------------------
    // Test Tools
    // ------------------------------------------------------------------------

    struct Fixed(ToolOutput);

    #[async_trait]
    impl Tool for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn execute(
            &self,
            _arguments: &Arguments,
            _ctx: &ExecutionContext,
            progress: Option<&ProgressRelay>,
        ) -> Result<ToolOutput, ToolError> {
            if let Some(relay) = progress {
                relay.progress(100.0, "done").await?;
            }
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn execute(
            &self,
            _arguments: &Arguments,
            _ctx: &ExecutionContext,
            _progress: Option<&ProgressRelay>,
        ) -> Result<ToolOutput, ToolError> {
            Err(ToolError::ExecutionFailed("upstream unavailable".to_string()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Tool for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn execute(
            &self,
            _arguments: &Arguments,
            _ctx: &ExecutionContext,
            _progress: Option<&ProgressRelay>,
        ) -> Result<ToolOutput, ToolError> {
            panic!("index out of range");
        }
    }

    /// Hands a clone of its relay to the test before returning.
    struct Lingering(std::sync::Mutex<Option<tokio::sync::oneshot::Sender<ProgressRelay>>>);

    #[async_trait]
    impl Tool for Lingering {
        fn name(&self) -> &str {
            "lingering"
        }

        async fn execute(
            &self,
            _arguments: &Arguments,
            _ctx: &ExecutionContext,
            progress: Option<&ProgressRelay>,
        ) -> Result<ToolOutput, ToolError> {
            let slot = self.0.lock().unwrap().take();
            if let (Some(tx), Some(relay)) = (slot, progress) {
                let _ = tx.send(relay.clone());
            }
            Ok(ToolOutput::from("returned"))
        }
    }

    fn runner_with(tool: impl Tool + 'static, max_size: usize) -> ToolRunner {
        let registry = ToolRegistry::new().register(Arc::new(tool));
        ToolRunner::new(Arc::new(registry), TruncationPolicy::new(max_size))
    }

    // ------------------------------------------------------------------------
    // run - Result production
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn unknown_tool_is_reported_not_found() {
        let runner = ToolRunner::new(Arc::new(ToolRegistry::new()), TruncationPolicy::default());
        let result = runner
            .run(&Invocation::new("c1", "missing"), &ExecutionContext::default(), None)
            .await;

        assert!(!result.success);
        assert_eq!(result.call_id, "c1");
        assert_eq!(result.error(), Some("tool not found: missing"));
    }

    #[tokio::test]
    async fn success_carries_wire_payload() {
        let runner = runner_with(Fixed(ToolOutput::Json(json!({"price": 12.5}))), 1_000);
        let result = runner
            .run(&Invocation::new("c1", "fixed"), &ExecutionContext::default(), None)
            .await;

        assert!(result.success);
        assert!(!result.was_truncated);
        assert_eq!(result.payload(), Some(r#"{"price":12.5}"#));
    }

    #[tokio::test]
    async fn tool_error_becomes_failed_result() {
        let runner = runner_with(Failing, 1_000);
        let result = runner
            .run(&Invocation::new("c2", "failing"), &ExecutionContext::default(), None)
            .await;

        assert!(!result.success);
        assert_eq!(
            result.error(),
            Some("tool execution failed: upstream unavailable")
        );
    }

    #[tokio::test]
    async fn panic_becomes_failed_result() {
        let runner = runner_with(Panicking, 1_000);
        let result = runner
            .run(&Invocation::new("c3", "panicking"), &ExecutionContext::default(), None)
            .await;

        assert!(!result.success);
        assert_eq!(result.error(), Some("tool panicked: index out of range"));
    }

    #[tokio::test]
    async fn oversized_payload_is_truncated() {
        let runner = runner_with(Fixed(ToolOutput::Text("x".repeat(50_000))), 10_000);
        let result = runner
            .run(&Invocation::new("c4", "fixed"), &ExecutionContext::default(), None)
            .await;

        assert!(result.success);
        assert!(result.was_truncated);
        let payload = result.payload().unwrap();
        assert!(payload.len() <= 10_000 + TRUNCATION_MARKER.len());
        assert!(payload.ends_with(TRUNCATION_MARKER));
    }

    // ------------------------------------------------------------------------
    // run - Relay handling
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn relay_events_are_written_and_relay_closed() {
        let runner = runner_with(Fixed(ToolOutput::from("ok")), 1_000);
        let (relay, mut rx) = relay::channel("c5", "fixed", 4);
        let watcher = relay.clone();

        let result = runner
            .run(
                &Invocation::new("c5", "fixed"),
                &ExecutionContext::default(),
                Some(relay),
            )
            .await;

        assert!(result.success);
        assert!(watcher.is_closed());
        let events = rx.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].kind(), EventKind::Progress { .. }));
    }

    #[tokio::test]
    async fn emit_after_return_is_rejected() {
        let (tx, handle_rx) = tokio::sync::oneshot::channel();
        let tool = Lingering(std::sync::Mutex::new(Some(tx)));
        let runner = runner_with(tool, 1_000);
        let (relay, mut rx) = relay::channel("c6", "lingering", 4);

        let result = runner
            .run(
                &Invocation::new("c6", "lingering"),
                &ExecutionContext::default(),
                Some(relay),
            )
            .await;
        assert!(result.success);

        let kept = handle_rx.await.unwrap();
        let err = kept.progress(50.0, "too late").await.unwrap_err();
        assert_eq!(err, RelayError::Closed("c6".to_string()));

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(rx.drain().is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_still_closes_relay() {
        let runner = ToolRunner::new(Arc::new(ToolRegistry::new()), TruncationPolicy::default());
        let (relay, _rx) = relay::channel("c7", "missing", 4);
        let watcher = relay.clone();

        runner
            .run(
                &Invocation::new("c7", "missing"),
                &ExecutionContext::default(),
                Some(relay),
            )
            .await;

        assert!(watcher.is_closed());
    }
}
