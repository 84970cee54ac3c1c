//! Per-invocation progress relay.
//!
//! A relay is a bounded, ordered queue from one running tool to the orchestrator.
//! `emit` waits for space when the queue is full; events are never dropped to make room.
//! Once the runner closes the relay, further emits are rejected and logged.
//! A relay whose reader is gone drops events silently: a tool never fails
//! because nobody is listening.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::Stream;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::event::{EventKind, LogLevel, ToolEvent};

/// Default number of events buffered per relay.
pub const DEFAULT_RELAY_CAPACITY: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    /// Emit after the tool already returned.
    #[error("progress relay for call '{0}' is closed")]
    Closed(String),
}

/// Create a relay for one invocation.
///
/// A capacity of zero is raised to one.
pub fn channel(
    call_id: impl Into<String>,
    tool_name: impl Into<String>,
    capacity: usize,
) -> (ProgressRelay, RelayReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let relay = ProgressRelay {
        call_id: Arc::from(call_id.into()),
        tool_name: Arc::from(tool_name.into()),
        tx,
        closed: Arc::new(AtomicBool::new(false)),
    };
    (relay, RelayReceiver { rx })
}

// ============================================================================
// ProgressRelay (producer side)
// ============================================================================

/// Handle a tool uses to emit events while it runs.
///
/// Clones share the same queue and the same closed flag.
#[derive(Debug, Clone)]
pub struct ProgressRelay {
    call_id: Arc<str>,
    tool_name: Arc<str>,
    tx: mpsc::Sender<ToolEvent>,
    closed: Arc<AtomicBool>,
}

impl ProgressRelay {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Emit one event, waiting for queue space if needed.
    ///
    /// Only fails after `close`.
    pub async fn emit(&self, kind: EventKind) -> Result<(), RelayError> {
        if self.is_closed() {
            error!(
                call_id = %self.call_id,
                tool = %self.tool_name,
                kind = kind.wire_name(),
                "Emit on closed progress relay; event dropped"
            );
            return Err(RelayError::Closed(self.call_id.to_string()));
        }

        let event = ToolEvent::new(self.call_id.as_ref(), self.tool_name.as_ref(), kind);
        if self.tx.send(event).await.is_err() {
            debug!(call_id = %self.call_id, "Progress relay has no reader; event dropped");
        }
        Ok(())
    }

    pub async fn progress(&self, percent: f64, message: impl Into<String>) -> Result<(), RelayError> {
        self.emit(EventKind::Progress {
            percent,
            message: message.into(),
        })
        .await
    }

    pub async fn log(&self, level: LogLevel, message: impl Into<String>) -> Result<(), RelayError> {
        self.emit(EventKind::Log {
            level,
            message: message.into(),
        })
        .await
    }

    pub async fn partial_output(
        &self,
        chunk: impl Into<String>,
        is_final: bool,
    ) -> Result<(), RelayError> {
        self.emit(EventKind::PartialOutput {
            chunk: chunk.into(),
            is_final,
        })
        .await
    }

    pub async fn custom(&self, tag: impl Into<String>, payload: Value) -> Result<(), RelayError> {
        self.emit(EventKind::Custom {
            tag: tag.into(),
            payload,
        })
        .await
    }

    /// Reject all further emits, on this handle and every clone.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// ============================================================================
// RelayReceiver (orchestrator side)
// ============================================================================

/// Reading end of a relay. Yields events in emission order.
#[derive(Debug)]
pub struct RelayReceiver {
    rx: mpsc::Receiver<ToolEvent>,
}

impl RelayReceiver {
    /// Wait for the next event. Returns `None` once every producer handle is dropped.
    pub async fn recv(&mut self) -> Option<ToolEvent> {
        self.rx.recv().await
    }

    /// Take everything currently buffered without waiting.
    pub fn drain(&mut self) -> Vec<ToolEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Stream for RelayReceiver {
    type Item = ToolEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
