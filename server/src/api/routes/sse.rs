//! SSE endpoint for live projection updates
//!
//! Every accepted event is pushed as a `telemetry` event. A subscriber that
//! falls behind gets a `resync` event and should refetch the graph and
//! transcript. On shutdown a `terminate` event is sent before the stream ends.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tokio::sync::watch;

use crate::core::{Topic, TopicError};
use crate::domain::ProjectionUpdate;

#[derive(Clone)]
pub struct SseState {
    pub updates: Topic<ProjectionUpdate>,
    pub shutdown_rx: watch::Receiver<bool>,
    pub keep_alive: Duration,
}

pub async fn sse(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscriber = state.updates.subscribe();
    let mut shutdown_rx = state.shutdown_rx.clone();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        yield Ok(Event::default().event("terminate").data("shutdown"));
                        break;
                    }
                }
                result = subscriber.recv() => {
                    match result {
                        Ok(update) => match serde_json::to_string(&update) {
                            Ok(data) => {
                                yield Ok(Event::default()
                                    .event("telemetry")
                                    .id(update.seq.to_string())
                                    .data(data));
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to serialize SSE event");
                            }
                        },
                        Err(TopicError::Lagged(n)) => {
                            tracing::warn!(lagged = n, "SSE subscriber lagged behind");
                            yield Ok(Event::default().event("resync").data(n.to_string()));
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.keep_alive)
            .text("keep-alive"),
    )
}
