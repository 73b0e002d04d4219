//! Telemetry event model and ingestion

mod ingest;
mod types;

pub use ingest::{EventIngestor, IngestError, IngestStats};
pub use types::{
    EventKind, EventLog, JsonMap, OrchestratorMessage, SystemMessage, TelemetryEvent, ToolCall,
    ToolResult,
};
