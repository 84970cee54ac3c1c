//! Batch orchestration.
//!
//! The orchestrator runs a batch of invocations, sequentially or concurrently, and
//! merges two event sources into one ordered stream:
//! - progress relays, one per invocation, written by the tools themselves
//! - its own lifecycle events (`tool_call_start`, `tool_call_complete`, `tools_end`)
//!
//! Ordering guarantees:
//! - Events of one invocation keep their emission order, and its start event comes
//!   before and its completion event after all of them
//! - Across invocations, order is submission order in sequential mode and arrival
//!   order in parallel mode
//! - `tools_end` is always last and carries every result in submission order

mod coordinator;
mod state;
mod stream;

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use ulid::Ulid;

use crate::background::BackgroundTasks;
use crate::invocation::{ExecutionContext, Invocation};
use crate::relay::DEFAULT_RELAY_CAPACITY;
use crate::tools::{ToolRegistry, ToolRunner};
use crate::truncation::TruncationPolicy;

use coordinator::Batch;

pub use state::{BatchPhase, CallState, CallTracker};
pub use stream::BatchStream;

// ============================================================================
// Options
// ============================================================================

/// How the invocations of a batch are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One at a time, in submission order. Fully deterministic output.
    Sequential,
    /// All at once, one task per invocation, with no concurrency cap.
    #[default]
    Parallel,
}

/// Per-batch settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub mode: ExecutionMode,
    /// Give each tool a progress relay. When false only lifecycle events are emitted.
    pub streaming: bool,
    pub truncation: TruncationPolicy,
    /// Buffer size of each relay and of the output stream.
    pub relay_capacity: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            streaming: true,
            truncation: TruncationPolicy::default(),
            relay_capacity: DEFAULT_RELAY_CAPACITY,
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Entry point for running batches against a tool registry.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<ToolRegistry>,
    tasks: BackgroundTasks,
}

impl Orchestrator {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            tasks: BackgroundTasks::new(),
        }
    }

    /// Register batch coordinators in a shared task registry (awaited on shutdown).
    #[must_use]
    pub fn with_background_tasks(mut self, tasks: BackgroundTasks) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Prepare a batch and return its event stream.
    ///
    /// Nothing runs until the stream is first polled. From then on the batch is
    /// driven by a detached coordinator task: dropping the stream stops delivery,
    /// but every invocation still runs to completion.
    pub fn run_batch(
        &self,
        invocations: Vec<Invocation>,
        ctx: ExecutionContext,
        options: BatchOptions,
    ) -> BatchStream {
        let batch_id = Ulid::new().to_string();

        if let Some(duplicate) = first_duplicate_call_id(&invocations) {
            warn!(batch_id = %batch_id, call_id = %duplicate, "Duplicate call id in batch");
        }

        let runner = ToolRunner::new(self.registry.clone(), options.truncation);
        let batch = Batch::new(batch_id, invocations, ctx, options, runner);
        BatchStream::new(batch, self.tasks.clone())
    }
}

/// First call id that appears more than once, if any.
pub fn first_duplicate_call_id(invocations: &[Invocation]) -> Option<&str> {
    let mut seen = HashSet::new();
    invocations
        .iter()
        .map(|i| i.call_id.as_str())
        .find(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_stream_in_parallel() {
        let options = BatchOptions::default();
        assert_eq!(options.mode, ExecutionMode::Parallel);
        assert!(options.streaming);
        assert_eq!(options.relay_capacity, DEFAULT_RELAY_CAPACITY);
    }

    #[test]
    fn execution_mode_serde_names() {
        let mode: ExecutionMode = serde_json::from_str(r#""sequential""#).unwrap();
        assert_eq!(mode, ExecutionMode::Sequential);
        assert_eq!(
            serde_json::to_string(&ExecutionMode::Parallel).unwrap(),
            r#""parallel""#
        );
    }

    #[test]
    fn finds_duplicate_call_ids() {
        let unique = vec![Invocation::new("a", "echo"), Invocation::new("b", "echo")];
        assert_eq!(first_duplicate_call_id(&unique), None);

        let dup = vec![
            Invocation::new("a", "echo"),
            Invocation::new("b", "echo"),
            Invocation::new("a", "wait"),
        ];
        assert_eq!(first_duplicate_call_id(&dup), Some("a"));
    }
}
