//! `/events` — tails the Server's operator event channel as Server-Sent
//! Events, so the HTTP layer can follow session/job/proxy events without
//! polling.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use wayfarer_server::ServerEvent;

use super::ApiState;

fn to_sse(event: Result<ServerEvent, tokio_stream::wrappers::errors::BroadcastStreamRecvError>) -> Event {
    match event {
        Ok(ev) => Event::default().event("server-event").data(format!("{ev:?}")),
        Err(_) => Event::default().event("lagged").data("dropped events, subscriber fell behind"),
    }
}

pub async fn handle_events_tail(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.server.subscribe_events();
    let stream = BroadcastStream::new(rx).map(|e| Ok(to_sse(e)));
    Sse::new(stream)
}
