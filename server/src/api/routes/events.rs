//! Telemetry ingest endpoint
//!
//! Frames are queued on the frames topic and folded by the pipeline, so a 202
//! only means the frame was accepted for processing. Malformed frames show up
//! in the diagnostics counters.

use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;

use crate::api::types::ApiError;
use crate::core::constants::BACKPRESSURE_RETRY_AFTER_SECS;
use crate::core::{Publisher, TopicError};
use crate::domain::RawFrame;

#[derive(Clone)]
pub struct EventsState {
    pub frames: Publisher<RawFrame>,
    pub max_frame_bytes: usize,
}

pub fn routes(frames: Publisher<RawFrame>, max_frame_bytes: usize) -> Router {
    Router::new()
        .route("/", post(publish))
        .layer(DefaultBodyLimit::max(max_frame_bytes))
        .with_state(EventsState {
            frames,
            max_frame_bytes,
        })
}

pub async fn publish(
    State(state): State<EventsState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            too_large(state.max_frame_bytes)
        } else {
            ApiError::bad_request("INVALID_BODY", rejection.body_text())
        }
    })?;
    if body.len() > state.max_frame_bytes {
        return Err(too_large(state.max_frame_bytes));
    }

    let body = String::from_utf8(body.to_vec())
        .map_err(|_| ApiError::bad_request("INVALID_UTF8", "Frame must be UTF-8 text"))?;

    match state.frames.publish(RawFrame { body }) {
        Ok(()) => Ok(StatusCode::ACCEPTED.into_response()),
        Err(TopicError::BufferFull) => {
            tracing::warn!("Frame buffer full, applying backpressure");
            Ok((
                StatusCode::SERVICE_UNAVAILABLE,
                [(
                    HeaderName::from_static("retry-after"),
                    BACKPRESSURE_RETRY_AFTER_SECS.to_string(),
                )],
            )
                .into_response())
        }
        Err(TopicError::ChannelClosed) => {
            Err(ApiError::service_unavailable("Ingest is shutting down"))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to publish frame");
            Err(ApiError::internal("Failed to queue frame"))
        }
    }
}

fn too_large(limit: usize) -> ApiError {
    ApiError::payload_too_large(format!("Frame exceeds {} bytes", limit))
}
