//! Lazy event stream returned by [`Orchestrator::run_batch`](super::Orchestrator::run_batch).

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::coordinator::Batch;
use crate::background::BackgroundTasks;
use crate::event::BatchEvent;

enum State {
    /// Not polled yet; nothing has run.
    Idle {
        batch: Box<Batch>,
        tasks: BackgroundTasks,
    },
    Running(ReceiverStream<BatchEvent>),
    Done,
}

/// Ordered stream of one batch's events. Ends after the `tools_end` event.
///
/// The coordinator is spawned on first poll. The stream can be consumed once;
/// after it ends it keeps returning `None`.
pub struct BatchStream {
    batch_id: String,
    state: State,
}

impl BatchStream {
    pub(super) fn new(batch: Batch, tasks: BackgroundTasks) -> Self {
        Self {
            batch_id: batch.id().to_string(),
            state: State::Idle {
                batch: Box::new(batch),
                tasks,
            },
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    fn start(&mut self) {
        if let State::Idle { batch, tasks } = std::mem::replace(&mut self.state, State::Done) {
            let (tx, rx) = mpsc::channel(batch.output_capacity());
            debug!(batch_id = %self.batch_id, "Spawning batch coordinator");
            tasks.spawn((*batch).drive(tx));
            self.state = State::Running(ReceiverStream::new(rx));
        }
    }
}

impl Stream for BatchStream {
    type Item = BatchEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if matches!(this.state, State::Idle { .. }) {
            this.start();
        }

        let State::Running(events) = &mut this.state else {
            return Poll::Ready(None);
        };

        match Pin::new(events).poll_next(cx) {
            Poll::Ready(None) => {
                this.state = State::Done;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}
