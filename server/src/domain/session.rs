//! Live projection state
//!
//! [`ProjectionSession`] is the single-writer owner of the event log and both
//! accumulators. [`DashboardService`] shares it between the frame pipeline
//! (writer) and HTTP handlers (readers).

use parking_lot::RwLock;
use serde::Serialize;

use super::graph::{GraphData, GraphProjector};
use super::inspector::{StepInspection, StepInspector};
use super::telemetry::{EventIngestor, EventLog, IngestError, TelemetryEvent};
use super::transcript::{ChatMessage, TranscriptProjector};

/// Counters exposed on the diagnostics endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub events: usize,
    pub accepted: u64,
    pub acks: u64,
    pub dropped: u64,
    pub orphan_results: u64,
    pub terminated: bool,
}

/// Event log plus incrementally folded graph and transcript.
#[derive(Debug, Clone)]
pub struct ProjectionSession {
    ingestor: EventIngestor,
    log: EventLog,
    graph: GraphProjector,
    transcript: TranscriptProjector,
}

impl ProjectionSession {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            ingestor: EventIngestor::new(max_frame_bytes),
            log: EventLog::new(),
            graph: GraphProjector::new(),
            transcript: TranscriptProjector::new(),
        }
    }

    /// Ingest a frame stamped with the wall clock.
    pub fn ingest(&mut self, frame: &str) -> Result<Option<TelemetryEvent>, IngestError> {
        let event = self.ingestor.ingest(frame)?;
        if let Some(event) = &event {
            self.apply(event.clone());
        }
        Ok(event)
    }

    /// Ingest a frame with an explicit receipt time.
    pub fn ingest_at(
        &mut self,
        frame: &str,
        received_at: i64,
    ) -> Result<Option<TelemetryEvent>, IngestError> {
        let event = self.ingestor.ingest_at(frame, received_at)?;
        if let Some(event) = &event {
            self.apply(event.clone());
        }
        Ok(event)
    }

    /// Fold an already stamped event and append it to the log.
    pub fn apply(&mut self, event: TelemetryEvent) {
        self.graph.apply(&event);
        self.transcript.apply(&event);
        self.log.append(event);
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn graph(&self) -> &GraphData {
        self.graph.graph()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        self.transcript.messages()
    }

    pub fn is_terminated(&self) -> bool {
        self.graph.is_terminated()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let stats = self.ingestor.stats();
        Diagnostics {
            events: self.log.len(),
            accepted: stats.accepted,
            acks: stats.acks,
            dropped: stats.dropped,
            orphan_results: self.graph.orphan_results(),
            terminated: self.graph.is_terminated(),
        }
    }
}

/// Shared dashboard state. Readers get owned snapshots.
pub struct DashboardService {
    session: RwLock<ProjectionSession>,
    inspector: StepInspector,
}

impl DashboardService {
    pub fn new(session: ProjectionSession, inspector: StepInspector) -> Self {
        Self {
            session: RwLock::new(session),
            inspector,
        }
    }

    /// Ingest a frame. Returns the event and the log length after it.
    pub fn ingest(&self, frame: &str) -> Result<Option<(TelemetryEvent, usize)>, IngestError> {
        let mut session = self.session.write();
        let event = session.ingest(frame)?;
        Ok(event.map(|e| (e, session.log().len())))
    }

    pub fn graph(&self) -> GraphData {
        self.session.read().graph().clone()
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.session.read().transcript().to_vec()
    }

    /// `None` when the node does not exist.
    pub fn inspect(&self, node_id: &str) -> Option<StepInspection> {
        let session = self.session.read();
        self.inspector.inspect(session.graph(), node_id)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.session.read().diagnostics()
    }

    pub fn is_terminated(&self) -> bool {
        self.session.read().is_terminated()
    }
}
