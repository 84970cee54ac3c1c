//! Drives one batch and writes its merged event stream.
//!
//! The coordinator owns the output sender. It is the only writer of lifecycle
//! events, so start-before-progress and progress-before-complete hold by
//! construction:
//! - a relay receiver joins the merge only after its start event was sent
//! - a relay receiver is removed and drained before its completion event is sent
//!
//! Tools run in their own tasks in both modes. When the consumer leaves, the
//! coordinator keeps reading every relay and discards the events, so emitting
//! tools neither block nor fail and every invocation still runs.

use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_stream::StreamMap;
use tracing::{debug, error, info};

use super::state::{BatchPhase, CallState, CallTracker};
use super::{BatchOptions, ExecutionMode};
use crate::event::{BatchEvent, BatchSummary, CallComplete, CallStart, ToolEvent};
use crate::invocation::{ExecutionContext, Invocation, InvocationResult};
use crate::relay::{self, ProgressRelay, RelayReceiver};
use crate::tools::ToolRunner;

// ============================================================================
// Output
// ============================================================================

/// Output side of the merged stream.
///
/// Once a send fails the consumer is gone for good: later sends are dropped
/// without touching the channel.
struct Output {
    tx: mpsc::Sender<BatchEvent>,
    delivering: bool,
    batch_id: String,
}

impl Output {
    fn new(tx: mpsc::Sender<BatchEvent>, batch_id: &str) -> Self {
        Self {
            tx,
            delivering: true,
            batch_id: batch_id.to_string(),
        }
    }

    /// Send one event. Returns whether the consumer is still there.
    async fn send(&mut self, event: BatchEvent) -> bool {
        if !self.delivering {
            return false;
        }
        if self.tx.send(event).await.is_err() {
            self.delivering = false;
            info!(batch_id = %self.batch_id, "Stream consumer gone, continuing without delivery");
        }
        self.delivering
    }

    async fn send_tool_events(&mut self, events: Vec<ToolEvent>) {
        for event in events {
            if !self.send(BatchEvent::Tool(event)).await {
                break;
            }
        }
    }

    fn is_delivering(&self) -> bool {
        self.delivering
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Everything needed to run one batch.
pub(super) struct Batch {
    id: String,
    invocations: Vec<Invocation>,
    ctx: ExecutionContext,
    options: BatchOptions,
    runner: ToolRunner,
}

impl Batch {
    pub(super) fn new(
        id: String,
        invocations: Vec<Invocation>,
        ctx: ExecutionContext,
        options: BatchOptions,
        runner: ToolRunner,
    ) -> Self {
        Self {
            id,
            invocations,
            ctx,
            options,
            runner,
        }
    }

    pub(super) fn id(&self) -> &str {
        &self.id
    }

    pub(super) fn output_capacity(&self) -> usize {
        self.options.relay_capacity.max(1)
    }

    /// Run every invocation, then send the summary. Always ends with `tools_end`
    /// unless the consumer is gone.
    pub(super) async fn drive(self, tx: mpsc::Sender<BatchEvent>) {
        let mut out = Output::new(tx, &self.id);
        let mut tracker = CallTracker::new(self.invocations.len());

        info!(
            batch_id = %self.id,
            calls = self.invocations.len(),
            mode = ?self.options.mode,
            streaming = self.options.streaming,
            "Batch started"
        );

        let results = match self.options.mode {
            ExecutionMode::Sequential => self.run_sequential(&mut out, &mut tracker).await,
            ExecutionMode::Parallel => self.run_parallel(&mut out, &mut tracker).await,
        };

        if tracker.phase() == BatchPhase::Active {
            error!(batch_id = %self.id, "Batch ended with unreported calls");
        }

        let summary = BatchSummary::from_results(&self.id, results);
        info!(
            batch_id = %self.id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            delivered = out.is_delivering(),
            "Batch finished"
        );
        out.send(BatchEvent::BatchEnd(summary)).await;
    }

    // ------------------------------------------------------------------------
    // Sequential
    // ------------------------------------------------------------------------

    /// All start events up front, then one invocation at a time.
    ///
    /// Every invocation runs, in order, whether or not the consumer is still there.
    async fn run_sequential(
        &self,
        out: &mut Output,
        tracker: &mut CallTracker,
    ) -> Vec<InvocationResult> {
        for invocation in &self.invocations {
            out.send(BatchEvent::CallStart(CallStart::for_invocation(invocation)))
                .await;
        }

        let mut results = Vec::with_capacity(self.invocations.len());
        for (index, invocation) in self.invocations.iter().enumerate() {
            tracker.start(index);
            debug!(batch_id = %self.id, call_id = %invocation.call_id, "Call started");
            let result = self.run_one(invocation, out).await;
            tracker.finish(index, result.success);
            out.send(BatchEvent::CallComplete(CallComplete::new(result.clone())))
                .await;
            tracker.report(index);
            results.push(result);
        }
        results
    }

    /// Run one invocation in its own task, forwarding its events as they come.
    async fn run_one(&self, invocation: &Invocation, out: &mut Output) -> InvocationResult {
        let (relay, mut rx) = if self.options.streaming {
            let (relay, rx) = relay::channel(
                &invocation.call_id,
                &invocation.tool_name,
                self.options.relay_capacity,
            );
            (Some(relay), Some(rx))
        } else {
            (None, None)
        };
        let mut handle = self.spawn_invocation(invocation, relay, None);

        let joined = loop {
            tokio::select! {
                biased;
                Some(event) = next_event(&mut rx) => {
                    out.send(BatchEvent::Tool(event)).await;
                }
                joined = &mut handle => break joined,
            }
        };

        if let Some(mut rx) = rx {
            out.send_tool_events(rx.drain()).await;
        }
        self.joined_result(invocation, joined)
    }

    /// Spawn the tool task of one invocation. It sends `started` first, if given.
    fn spawn_invocation(
        &self,
        invocation: &Invocation,
        relay: Option<ProgressRelay>,
        started: Option<(usize, mpsc::UnboundedSender<usize>)>,
    ) -> JoinHandle<InvocationResult> {
        let runner = self.runner.clone();
        let ctx = self.ctx.clone();
        let invocation = invocation.clone();
        tokio::spawn(async move {
            if let Some((index, started_tx)) = started {
                let _ = started_tx.send(index);
            }
            runner.run(&invocation, &ctx, relay).await
        })
    }

    /// Result of a joined tool task. A join error becomes a failed result.
    fn joined_result(
        &self,
        invocation: &Invocation,
        joined: Result<InvocationResult, JoinError>,
    ) -> InvocationResult {
        joined.unwrap_or_else(|e| {
            error!(
                batch_id = %self.id,
                call_id = %invocation.call_id,
                error = %e,
                "Tool task aborted"
            );
            InvocationResult::failed(
                &invocation.call_id,
                &invocation.tool_name,
                format!("tool task aborted: {e}"),
                false,
                0,
            )
        })
    }

    // ------------------------------------------------------------------------
    // Parallel
    // ------------------------------------------------------------------------

    /// One task per invocation; events merged in arrival order.
    async fn run_parallel(
        &self,
        out: &mut Output,
        tracker: &mut CallTracker,
    ) -> Vec<InvocationResult> {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel::<usize>();
        let mut waiting: Vec<Option<RelayReceiver>> = Vec::with_capacity(self.invocations.len());
        let mut running = FuturesUnordered::new();

        for (index, invocation) in self.invocations.iter().enumerate() {
            let relay = if self.options.streaming {
                let (relay, rx) = relay::channel(
                    &invocation.call_id,
                    &invocation.tool_name,
                    self.options.relay_capacity,
                );
                waiting.push(Some(rx));
                Some(relay)
            } else {
                waiting.push(None);
                None
            };

            let handle =
                self.spawn_invocation(invocation, relay, Some((index, started_tx.clone())));
            running.push(async move { (index, handle.await) });
        }
        drop(started_tx);

        let mut merge = Merge {
            waiting,
            live: StreamMap::new(),
        };
        let mut results: Vec<Option<InvocationResult>> =
            (0..self.invocations.len()).map(|_| None).collect();

        while !running.is_empty() {
            tokio::select! {
                Some(index) = started_rx.recv() => {
                    self.announce(index, tracker, &mut merge, out).await;
                }
                Some((_, event)) = merge.live.next(), if !merge.live.is_empty() => {
                    out.send(BatchEvent::Tool(event)).await;
                }
                Some((index, joined)) = running.next() => {
                    // A task can finish before its start notice is read.
                    self.announce(index, tracker, &mut merge, out).await;

                    let result = self.joined_result(&self.invocations[index], joined);

                    if let Some(mut rx) = merge.live.remove(&index) {
                        out.send_tool_events(rx.drain()).await;
                    }

                    tracker.finish(index, result.success);
                    out.send(BatchEvent::CallComplete(CallComplete::new(result.clone())))
                        .await;
                    tracker.report(index);
                    results[index] = Some(result);
                }
            }
        }

        results.into_iter().flatten().collect()
    }

    /// Emit the start event for a call once, then let its events into the merge.
    async fn announce(
        &self,
        index: usize,
        tracker: &mut CallTracker,
        merge: &mut Merge,
        out: &mut Output,
    ) {
        if tracker.state(index) != Some(CallState::Pending) {
            return;
        }
        tracker.start(index);

        let invocation = &self.invocations[index];
        debug!(batch_id = %self.id, call_id = %invocation.call_id, "Call started");
        out.send(BatchEvent::CallStart(CallStart::for_invocation(invocation)))
            .await;

        if let Some(rx) = merge.waiting.get_mut(index).and_then(Option::take) {
            merge.live.insert(index, rx);
        }
    }
}

/// Relay receivers of a parallel batch.
///
/// Receivers stay here until their call completes, consumer or not.
struct Merge {
    /// Receivers of calls whose start event has not been sent yet.
    waiting: Vec<Option<RelayReceiver>>,
    /// Receivers being forwarded, keyed by submission index.
    live: StreamMap<usize, RelayReceiver>,
}

/// Next event of an optional receiver. Never resolves when there is none.
fn next_event(rx: &mut Option<RelayReceiver>) -> impl Future<Output = Option<ToolEvent>> + '_ {
    async move {
        match rx {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }
}
