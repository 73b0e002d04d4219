//! Telemetry event types.
//!
//! Wire shape: `{ "type": string, "data": object, "timestamp": number }`.
//! The timestamp is assigned at receipt by the ingestor and never taken from
//! the sender.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// JSON object payload carried by an event.
pub type JsonMap = Map<String, JsonValue>;

// ============================================================================
// EVENT KIND
// ============================================================================

/// Recognized telemetry event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    OrchestratorMessage,
    ToolResult,
    SystemMessage,
    /// Control frame, dropped before reaching the log.
    Ack,
}

impl EventKind {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "orchestrator_message" => Some(Self::OrchestratorMessage),
            "tool_result" => Some(Self::ToolResult),
            "system_message" => Some(Self::SystemMessage),
            "ack" => Some(Self::Ack),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrchestratorMessage => "orchestrator_message",
            Self::ToolResult => "tool_result",
            Self::SystemMessage => "system_message",
            Self::Ack => "ack",
        }
    }
}

// ============================================================================
// TELEMETRY EVENT
// ============================================================================

/// One immutable entry of the event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: JsonMap,
    /// Receipt-order timestamp in milliseconds, strictly increasing across the log
    pub timestamp: i64,
}

impl TelemetryEvent {
    pub fn new(kind: EventKind, data: JsonMap, timestamp: i64) -> Self {
        Self {
            kind,
            data,
            timestamp,
        }
    }

    /// Typed view of an `orchestrator_message` payload.
    pub fn orchestrator_message(&self) -> OrchestratorMessage {
        OrchestratorMessage::from_data(&self.data)
    }

    /// Typed view of a `tool_result` payload.
    pub fn tool_result(&self) -> ToolResult {
        ToolResult::from_data(&self.data)
    }

    /// Typed view of a `system_message` payload.
    pub fn system_message(&self) -> SystemMessage {
        SystemMessage::from_data(&self.data)
    }
}

// ============================================================================
// PAYLOAD VIEWS
// ============================================================================
//
// Every view is lenient: an absent or mistyped field becomes an empty value so
// a schema gap never fails the fold.

fn str_field(data: &JsonMap, key: &str) -> String {
    data.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// A single requested tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub name: String,
    /// Raw arguments as sent (usually an object)
    pub args: JsonValue,
}

impl ToolCall {
    fn from_value(value: &JsonValue) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            name: str_field(obj, "name"),
            args: obj
                .get("args")
                .cloned()
                .unwrap_or_else(|| JsonValue::Object(JsonMap::new())),
        })
    }

    /// `name + " " + compact JSON args`, keys in the order they arrived.
    pub fn payload_text(&self) -> String {
        format!("{} {}", self.name, self.args)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrchestratorMessage {
    /// Free-text content, `None` when absent or empty
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl OrchestratorMessage {
    pub fn from_data(data: &JsonMap) -> Self {
        let content = data
            .get("content")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let tool_calls = data
            .get("tool_calls")
            .and_then(|v| v.as_array())
            .map(|calls| calls.iter().filter_map(ToolCall::from_value).collect())
            .unwrap_or_default();

        Self {
            content,
            tool_calls,
        }
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tool_calls.iter().map(|tc| tc.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResult {
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn from_data(data: &JsonMap) -> Self {
        // Non-string content (e.g. structured output) is kept as its JSON text
        let content = match data.get("content") {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        Self {
            tool_name: str_field(data, "tool_name"),
            content,
            is_error: data
                .get("is_error")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemMessage {
    pub level: String,
    pub content: String,
}

impl SystemMessage {
    pub fn from_data(data: &JsonMap) -> Self {
        Self {
            level: str_field(data, "level"),
            content: str_field(data, "content"),
        }
    }
}

// ============================================================================
// EVENT LOG
// ============================================================================

/// Append-only ordered event sequence.
///
/// Single writer (the session that owns the ingestor), any number of readers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<TelemetryEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: TelemetryEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[TelemetryEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl FromIterator<TelemetryEvent> for EventLog {
    fn from_iter<I: IntoIterator<Item = TelemetryEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}
