//! Domain logic for the security-agent dashboard
//!
//! - `telemetry` - Event model and frame ingestion
//! - `graph` - Telemetry-to-graph projection
//! - `transcript` - Chat transcript projection
//! - `analyzer` - Tool knowledge and flag annotation
//! - `inspector` - Per-node step inspection
//! - `session` - Shared projection state
//! - `pipeline` - Frame processing pipeline

pub mod analyzer;
pub mod graph;
pub mod inspector;
pub mod pipeline;
pub mod session;
pub mod telemetry;
pub mod thought;
pub mod transcript;

pub use analyzer::{AnalysisResult, KnowledgeBase, PayloadAnalyzer};
pub use graph::{GraphData, GraphProjector};
pub use inspector::{StepInspection, StepInspector};
pub use pipeline::{FramePipeline, ProjectionUpdate, RawFrame};
pub use session::{DashboardService, Diagnostics, ProjectionSession};
pub use telemetry::{EventIngestor, IngestError, TelemetryEvent};
pub use transcript::{ChatMessage, TranscriptProjector};
