//! Server-Sent Events support

use crate::runtime::SessionEvent;
use crate::transport::OutgoingMessage;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Merge session events and the user's inbox into one SSE stream
pub fn sse_stream(
    init_event: SessionEvent,
    session_rx: broadcast::Receiver<SessionEvent>,
    inbox_rx: broadcast::Receiver<OutgoingMessage>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Create stream that starts with init event then broadcasts
    let init = futures::stream::once(async move { Ok(session_event_to_axum(init_event)) });

    let session = BroadcastStream::new(session_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(session_event_to_axum(event))),
        Err(_) => None, // Skip lagged messages
    });

    let inbox = BroadcastStream::new(inbox_rx).filter_map(|result| match result {
        Ok(message) => Some(Ok(session_event_to_axum(SessionEvent::Incoming { message }))),
        Err(_) => None,
    });

    let combined = init.chain(session.merge(inbox));

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn session_event_to_axum(event: SessionEvent) -> Event {
    let (event_type, data) = match event {
        SessionEvent::Init { state, contacts } => (
            "init",
            json!({
                "type": "init",
                "phase": state.phase(),
                "state": state,
                "contacts": contacts
            }),
        ),
        SessionEvent::Notification(notification) => (
            "notification",
            json!({
                "type": "notification",
                "notification": notification
            }),
        ),
        SessionEvent::StateChange { state } => (
            "state_change",
            json!({
                "type": "state_change",
                "phase": state.phase(),
                "busy": state.is_leased(),
                "state": state
            }),
        ),
        SessionEvent::Incoming { message } => (
            "message",
            json!({
                "type": "message",
                "message": message
            }),
        ),
        SessionEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
