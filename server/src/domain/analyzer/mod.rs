//! Heuristic payload analyzer
//!
//! Maps a tool name and its raw command text to documented flags. Flags are
//! found by plain substring search, so a flag that is a substring of another
//! flag or of an argument value is reported too. This is a best-effort
//! annotation for human review, not a command parser.

mod knowledge;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;

pub use knowledge::{FlagDoc, KnowledgeBase, KnowledgeError, ToolKnowledge};

/// Tool assumed by [`guess_tool_name`] when nothing more specific matches.
pub const FALLBACK_TOOL: &str = "kali_exec";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedFlag {
    pub flag: String,
    pub meaning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub anatomy: ToolKnowledge,
    /// Matches in the table's declared order
    pub detected: Vec<DetectedFlag>,
}

/// Stateless lookup over a shared [`KnowledgeBase`].
#[derive(Debug, Clone)]
pub struct PayloadAnalyzer {
    knowledge: Arc<KnowledgeBase>,
}

impl PayloadAnalyzer {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }

    /// Analyze a tool call given its raw argument JSON.
    pub fn analyze(&self, tool_name: &str, args: &JsonValue) -> Option<AnalysisResult> {
        self.analyze_text(tool_name, &command_text(args))
    }

    /// Analyze a tool call given the command text directly.
    ///
    /// Returns `None` when the tool is not in the table.
    pub fn analyze_text(&self, tool_name: &str, command: &str) -> Option<AnalysisResult> {
        let anatomy = self.knowledge.get(tool_name)?;
        let detected = anatomy
            .flags
            .iter()
            .filter(|doc| command.contains(doc.flag.as_str()))
            .map(|doc| DetectedFlag {
                flag: doc.flag.clone(),
                meaning: doc.meaning.clone(),
            })
            .collect();

        Some(AnalysisResult {
            anatomy: anatomy.clone(),
            detected,
        })
    }
}

/// Text scanned for flags: `command`, else `code`, else all argument values
/// joined by spaces.
pub fn command_text(args: &JsonValue) -> String {
    match args {
        JsonValue::Object(map) => {
            for key in ["command", "code"] {
                if let Some(JsonValue::String(s)) = map.get(key)
                    && !s.is_empty()
                {
                    return s.clone();
                }
            }
            map.values()
                .map(|v| match v {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ")
        }
        JsonValue::String(s) => s.clone(),
        _ => String::new(),
    }
}

/// Legacy identification of a tool from free payload text.
///
/// Only used where no explicit tool identity was recorded. `nmap` is checked
/// after `sqlmap`, so it wins when both appear.
pub fn guess_tool_name(payload: &str) -> &'static str {
    let mut tool = FALLBACK_TOOL;
    if payload.contains("sqlmap") {
        tool = "kali_sqlmap";
    }
    if payload.contains("nmap") {
        tool = "kali_nmap";
    }
    tool
}
