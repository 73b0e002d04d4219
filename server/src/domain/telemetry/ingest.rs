//! Frame ingestion
//!
//! Turns raw transport frames into stamped [`TelemetryEvent`]s. Bad frames are
//! rejected with a diagnostic and never reach the log.

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::types::{EventKind, JsonMap, TelemetryEvent};

/// Why a frame was rejected.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("invalid JSON frame: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("unknown event type '{0}'")]
    UnknownType(String),
    #[error("`data` must be an object")]
    InvalidData,
}

/// Running counters for ingested frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub acks: u64,
    pub dropped: u64,
}

/// Parses frames and assigns receipt-order timestamps.
#[derive(Debug, Clone)]
pub struct EventIngestor {
    max_frame_bytes: usize,
    last_timestamp: Option<i64>,
    stats: IngestStats,
}

impl EventIngestor {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            last_timestamp: None,
            stats: IngestStats::default(),
        }
    }

    /// Ingest a frame stamped with the current wall clock.
    pub fn ingest(&mut self, frame: &str) -> Result<Option<TelemetryEvent>, IngestError> {
        self.ingest_at(frame, chrono::Utc::now().timestamp_millis())
    }

    /// Ingest a frame received at `received_at` (milliseconds).
    ///
    /// Returns `Ok(None)` for `ack` frames. The assigned timestamp is strictly
    /// greater than every previously assigned one, even if the clock stalls or
    /// runs backwards.
    pub fn ingest_at(
        &mut self,
        frame: &str,
        received_at: i64,
    ) -> Result<Option<TelemetryEvent>, IngestError> {
        match self.parse(frame) {
            Ok(None) => {
                self.stats.acks += 1;
                Ok(None)
            }
            Ok(Some((kind, data))) => {
                let timestamp = match self.last_timestamp {
                    Some(last) if received_at <= last => last + 1,
                    _ => received_at,
                };
                self.last_timestamp = Some(timestamp);
                self.stats.accepted += 1;
                Ok(Some(TelemetryEvent::new(kind, data, timestamp)))
            }
            Err(e) => {
                self.stats.dropped += 1;
                tracing::debug!(error = %e, "Dropped telemetry frame");
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    fn parse(&self, frame: &str) -> Result<Option<(EventKind, JsonMap)>, IngestError> {
        if frame.len() > self.max_frame_bytes {
            return Err(IngestError::TooLarge {
                size: frame.len(),
                limit: self.max_frame_bytes,
            });
        }

        let value: JsonValue = serde_json::from_str(frame)?;
        let JsonValue::Object(mut obj) = value else {
            return Err(IngestError::NotAnObject);
        };

        let type_name = obj
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(IngestError::MissingType)?;
        let kind = EventKind::from_wire(type_name)
            .ok_or_else(|| IngestError::UnknownType(type_name.to_string()))?;

        if kind == EventKind::Ack {
            return Ok(None);
        }

        let data = match obj.remove("data") {
            Some(JsonValue::Object(data)) => data,
            Some(JsonValue::Null) | None => JsonMap::new(),
            Some(_) => return Err(IngestError::InvalidData),
        };

        Ok(Some((kind, data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1024;

    #[test]
    fn test_ingest_orchestrator_message() {
        let mut ingestor = EventIngestor::new(LIMIT);
        let event = ingestor
            .ingest_at(
                r#"{"type":"orchestrator_message","data":{"content":"hi"}}"#,
                100,
            )
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, EventKind::OrchestratorMessage);
        assert_eq!(event.timestamp, 100);
        assert_eq!(event.orchestrator_message().content.as_deref(), Some("hi"));
    }

    #[test]
    fn test_ack_is_discarded() {
        let mut ingestor = EventIngestor::new(LIMIT);
        let result = ingestor
            .ingest_at(r#"{"type":"ack","message":"Server received: start"}"#, 1)
            .unwrap();
        assert!(result.is_none());
        assert_eq!(ingestor.stats().acks, 1);
        assert_eq!(ingestor.stats().accepted, 0);
    }

    #[test]
    fn test_sender_timestamp_is_ignored() {
        let mut ingestor = EventIngestor::new(LIMIT);
        let event = ingestor
            .ingest_at(
                r#"{"type":"system_message","data":{},"timestamp":99999}"#,
                5,
            )
            .unwrap()
            .unwrap();
        assert_eq!(event.timestamp, 5);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut ingestor = EventIngestor::new(LIMIT);
        let frame = r#"{"type":"system_message","data":{}}"#;
        let a = ingestor.ingest_at(frame, 10).unwrap().unwrap();
        let b = ingestor.ingest_at(frame, 10).unwrap().unwrap();
        let c = ingestor.ingest_at(frame, 3).unwrap().unwrap();
        let d = ingestor.ingest_at(frame, 50).unwrap().unwrap();
        assert_eq!(
            [a.timestamp, b.timestamp, c.timestamp, d.timestamp],
            [10, 11, 12, 50]
        );
    }

    #[test]
    fn test_missing_data_defaults_to_empty() {
        let mut ingestor = EventIngestor::new(LIMIT);
        let event = ingestor
            .ingest_at(r#"{"type":"tool_result"}"#, 1)
            .unwrap()
            .unwrap();
        assert!(event.data.is_empty());
    }

    #[test]
    fn test_malformed_frames_are_rejected_and_counted() {
        let mut ingestor = EventIngestor::new(LIMIT);
        assert!(matches!(
            ingestor.ingest_at("{not json", 1),
            Err(IngestError::InvalidJson(_))
        ));
        assert!(matches!(
            ingestor.ingest_at("[1,2]", 1),
            Err(IngestError::NotAnObject)
        ));
        assert!(matches!(
            ingestor.ingest_at(r#"{"data":{}}"#, 1),
            Err(IngestError::MissingType)
        ));
        assert!(matches!(
            ingestor.ingest_at(r#"{"type":"heartbeat"}"#, 1),
            Err(IngestError::UnknownType(t)) if t == "heartbeat"
        ));
        assert!(matches!(
            ingestor.ingest_at(r#"{"type":"tool_result","data":"oops"}"#, 1),
            Err(IngestError::InvalidData)
        ));
        assert_eq!(ingestor.stats().dropped, 5);
        assert_eq!(ingestor.stats().accepted, 0);
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let mut ingestor = EventIngestor::new(16);
        let err = ingestor
            .ingest_at(r#"{"type":"system_message","data":{}}"#, 1)
            .unwrap_err();
        assert!(matches!(err, IngestError::TooLarge { limit: 16, .. }));
    }

    #[test]
    fn test_rejected_frame_does_not_advance_clock() {
        let mut ingestor = EventIngestor::new(LIMIT);
        let frame = r#"{"type":"system_message","data":{}}"#;
        ingestor.ingest_at(frame, 10).unwrap();
        let _ = ingestor.ingest_at("garbage", 20);
        let event = ingestor.ingest_at(frame, 10).unwrap().unwrap();
        assert_eq!(event.timestamp, 11);
    }
}
