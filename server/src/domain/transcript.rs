//! Chat transcript projection
//!
//! Independent fold over the same event log as the graph. Only
//! `orchestrator_message` and `tool_result` produce lines.

use serde::Serialize;

use super::telemetry::{EventKind, TelemetryEvent};

/// Characters of tool output quoted in a result line
pub const RESULT_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    System,
    Agent,
    /// Operator-authored input. Never derived from telemetry.
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Event timestamp as a string
    pub id: String,
    pub kind: ChatKind,
    pub content: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptProjector {
    messages: Vec<ChatMessage>,
}

impl TranscriptProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(events: &[TelemetryEvent]) -> Vec<ChatMessage> {
        events.iter().fold(Self::new(), Self::fold).into_messages()
    }

    pub fn fold(mut self, event: &TelemetryEvent) -> Self {
        self.apply(event);
        self
    }

    pub fn apply(&mut self, event: &TelemetryEvent) {
        let (kind, content) = match event.kind {
            EventKind::OrchestratorMessage => {
                let msg = event.orchestrator_message();
                let content = match msg.content {
                    Some(content) => content,
                    None => format!("Executing tools: {}", msg.tool_names().join(", ")),
                };
                (ChatKind::Agent, content)
            }
            EventKind::ToolResult => {
                let result = event.tool_result();
                let preview: String = result.content.chars().take(RESULT_PREVIEW_CHARS).collect();
                // The ellipsis is appended even when nothing was cut
                let content = format!(
                    "[{}] {}: {}...",
                    result.tool_name,
                    if result.is_error { "FAILED" } else { "SUCCESS" },
                    preview
                );
                (ChatKind::System, content)
            }
            EventKind::SystemMessage | EventKind::Ack => return,
        };

        self.messages.push(ChatMessage {
            id: event.timestamp.to_string(),
            kind,
            content,
            timestamp: event.timestamp,
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }
}
