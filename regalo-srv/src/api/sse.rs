//! Server-Sent Events for one reveal session
//!
//! Streams the session's current view first, then every `RevealEvent` for
//! that session: phase changes, countdown ticks and effects. A client that
//! falls behind the bus gets a fresh view instead of the events it missed.
//! The stream holds a lease on the session; the session is removed once the
//! last stream has been closed for the grace period.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::session::SessionView;
use crate::AppState;

/// GET /api/sessions/:id/events
pub async fn event_stream(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let session = state.sessions.get(session_id).await?;
    // Subscribe before taking the snapshot so no transition falls in between
    let mut rx = state.events.subscribe();
    let lease = state.sessions.attach_stream(&session);
    drop(session);

    info!(
        "SSE client connected to session {} ({} streams on the bus)",
        session_id,
        state.events.subscriber_count()
    );

    let stream = async_stream::stream! {
        if let Some(frame) = view_event(&lease.session().view().await) {
            yield Ok(frame);
        }

        loop {
            match rx.recv().await {
                Ok(event) if event.session_id() == session_id => {
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!("SSE: {} for {}", event_type, session_id);
                            yield Ok(Event::default().event(event_type).data(json));
                        }
                        Err(e) => warn!("SSE: Failed to serialize event {}: {}", event_type, e),
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "SSE client for {} lagged, skipped {} events; resending view",
                        session_id, skipped
                    );
                    if let Some(frame) = view_event(&lease.session().view().await) {
                        yield Ok(frame);
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}

fn view_event(view: &SessionView) -> Option<Event> {
    match serde_json::to_string(view) {
        Ok(json) => Some(Event::default().event("SessionView").data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize view for {}: {}", view.session_id, e);
            None
        }
    }
}
