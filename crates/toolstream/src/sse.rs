//! SSE framing for batch event streams.
//!
//! Each [`BatchEvent`] becomes one named frame whose `data` is the event's JSON.

use std::convert::Infallible;

use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use tracing::warn;

use crate::event::BatchEvent;

/// Convert one batch event into an SSE frame.
pub fn to_sse_event(event: &BatchEvent) -> Event {
    let name = event.wire_name();
    match event.to_json() {
        Ok(data) => Event::default()
            .event(name)
            .json_data(data)
            .unwrap_or_else(|_| Event::default().event(name).data("{}")),
        Err(e) => {
            warn!(event = name, error = %e, "Failed to serialize batch event");
            Event::default().event(name).data("{}")
        }
    }
}

/// Frame a batch stream for `axum::response::sse::Sse`.
pub fn sse_stream(
    events: impl Stream<Item = BatchEvent> + Send + 'static,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    events.map(|event| Ok(to_sse_event(&event)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use axum::response::sse::Sse;
    use http_body_util::BodyExt;

    use crate::event::{BatchSummary, CallStart, EventKind, ToolEvent};
    use crate::invocation::Invocation;

    async fn render(events: Vec<BatchEvent>) -> String {
        let response = Sse::new(sse_stream(futures::stream::iter(events))).into_response();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn frames_carry_wire_names_and_json() {
        let body = render(vec![
            BatchEvent::CallStart(CallStart::for_invocation(&Invocation::new("c1", "echo"))),
            BatchEvent::Tool(ToolEvent::new(
                "c1",
                "echo",
                EventKind::Progress {
                    percent: 50.0,
                    message: "half".to_string(),
                },
            )),
            BatchEvent::BatchEnd(BatchSummary::from_results("b1", Vec::new())),
        ])
        .await;

        assert!(body.contains("event: tool_call_start\n"));
        assert!(body.contains("event: tool_progress\n"));
        assert!(body.contains("event: tools_end\n"));
        assert!(body.contains(r#""call_id":"c1""#));
        assert!(body.contains(r#""percent":50.0"#));
        assert!(body.contains(r#""batch_id":"b1""#));
    }
}
