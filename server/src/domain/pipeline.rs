//! Frame Processing Pipeline
//!
//! Consumes the frames stream, folds each frame into the dashboard and
//! announces accepted events on the updates topic.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::session::DashboardService;
use super::telemetry::TelemetryEvent;
use crate::core::{Publisher, StreamSubscriber, TopicMessage};

/// Raw transport frame as received.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub body: String,
}

impl TopicMessage for RawFrame {
    fn size_bytes(&self) -> usize {
        self.body.len().max(1)
    }
}

/// Notification that one event was folded into the projection.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionUpdate {
    /// Log length after this event
    pub seq: usize,
    pub event: TelemetryEvent,
    pub terminated: bool,
}

impl TopicMessage for ProjectionUpdate {
    fn size_bytes(&self) -> usize {
        (self.event.data.len() * 128).max(128)
    }
}

pub struct FramePipeline {
    dashboard: Arc<DashboardService>,
    updates: Publisher<ProjectionUpdate>,
}

impl FramePipeline {
    pub fn new(dashboard: Arc<DashboardService>, updates: Publisher<ProjectionUpdate>) -> Self {
        Self { dashboard, updates }
    }

    /// Fold frames until shutdown, then drain what is still queued.
    ///
    /// Each frame is acked only after it was folded, so publishers see
    /// backpressure while the pipeline is behind.
    pub fn start(
        self,
        mut subscriber: StreamSubscriber<RawFrame>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut shutdown_requested = false;

            loop {
                if shutdown_requested {
                    // Drain remaining frames before shutdown
                    match tokio::time::timeout(Duration::from_millis(100), subscriber.recv()).await
                    {
                        Ok(Ok(frame)) => {
                            self.run(&frame);
                            subscriber.ack(&frame);
                            continue;
                        }
                        _ => break,
                    }
                }

                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("FramePipeline received shutdown, draining...");
                            shutdown_requested = true;
                        }
                    }
                    result = subscriber.recv() => {
                        match result {
                            Ok(frame) => {
                                self.run(&frame);
                                subscriber.ack(&frame);
                            }
                            Err(_) => break,
                        }
                    }
                }
            }
            tracing::debug!("FramePipeline shutdown complete");
        })
    }

    fn run(&self, frame: &RawFrame) {
        // Rejected frames are already logged and counted by the ingestor
        let Ok(Some((event, seq))) = self.dashboard.ingest(&frame.body) else {
            return;
        };

        let update = ProjectionUpdate {
            seq,
            terminated: self.dashboard.is_terminated(),
            event,
        };
        if let Err(e) = self.updates.publish(update) {
            tracing::debug!(error = %e, seq, "Dropped projection update");
        }
    }
}
