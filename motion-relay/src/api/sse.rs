//! Server-Sent Events push channel
//!
//! Every message is an `update` event carrying the full published snapshot.
//! A new subscriber gets the current snapshot first, then one message per
//! change.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use motion_common::PublishedSnapshot;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::server::AppContext;

/// SSE event name for snapshot messages
pub const UPDATE_EVENT: &str = "update";

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before reading the snapshot so no change falls in between
    let rx = ctx.state.subscribe();
    let initial = ctx.state.current_snapshot().await;
    debug!(
        "New SSE client connected, total clients: {}",
        ctx.state.subscriber_count()
    );

    let updates = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(snapshot) => update_event(&snapshot).map(Ok),
            Err(e) => {
                // Lagged: the next snapshot supersedes anything missed
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    let stream = futures::stream::iter(update_event(&initial).map(Ok)).chain(updates);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Wrap a snapshot as an `update` event
pub fn update_event(snapshot: &PublishedSnapshot) -> Option<Event> {
    match Event::default()
        .event(UPDATE_EVENT)
        .id(Uuid::new_v4().to_string())
        .json_data(snapshot)
    {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Failed to serialize snapshot: {}", e);
            None
        }
    }
}
