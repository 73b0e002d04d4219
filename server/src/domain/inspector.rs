//! Step inspection
//!
//! Read-only view of one node's step record for the detail panel. Missing
//! records and empty fields are reported with fixed placeholder strings.

use serde::Serialize;

use super::analyzer::{AnalysisResult, PayloadAnalyzer, guess_tool_name};
use super::graph::{GraphData, NodeKind, StepRecord};
use super::thought::extract_thought;

pub const NO_PAYLOAD: &str = "No payload generated yet.";
pub const NO_LOGS: &str = "Waiting for execution logs...";
pub const NO_CONCLUSION: &str = "Waiting for agent reasoning conclusion...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepInspection {
    pub node_id: String,
    pub title: String,
    pub payload: String,
    pub logs: String,
    /// Conclusion with any `<thought>` block removed
    pub conclusion: String,
    pub thought: Option<String>,
    pub analysis: Option<AnalysisResult>,
}

#[derive(Debug, Clone)]
pub struct StepInspector {
    analyzer: PayloadAnalyzer,
}

impl StepInspector {
    pub fn new(analyzer: PayloadAnalyzer) -> Self {
        Self { analyzer }
    }

    /// Inspect `node_id` in `graph`. `None` only when the node does not exist.
    pub fn inspect(&self, graph: &GraphData, node_id: &str) -> Option<StepInspection> {
        let node = graph.node(node_id)?;

        let Some(record) = graph.step(node_id) else {
            return Some(StepInspection {
                node_id: node_id.to_string(),
                title: node.label.clone(),
                payload: NO_PAYLOAD.to_string(),
                logs: NO_LOGS.to_string(),
                conclusion: NO_CONCLUSION.to_string(),
                thought: None,
                analysis: None,
            });
        };

        let parsed = extract_thought(&record.conclusion);
        Some(StepInspection {
            node_id: node_id.to_string(),
            title: record.title.clone(),
            payload: or_placeholder(&record.payload, NO_PAYLOAD),
            logs: or_placeholder(&record.logs, NO_LOGS),
            conclusion: or_placeholder(&parsed.content, NO_CONCLUSION),
            thought: parsed.thought,
            analysis: self.analyze(node.kind, record),
        })
    }

    fn analyze(&self, kind: NodeKind, record: &StepRecord) -> Option<AnalysisResult> {
        match (&record.tool_name, kind) {
            (Some(tool), _) => match &record.args {
                Some(args) if !args.is_null() => self.analyzer.analyze(tool, args),
                _ => self.analyzer.analyze_text(tool, &record.payload),
            },
            // Aggregate records carry no single identity; guess from the text
            (None, NodeKind::Worker) => self
                .analyzer
                .analyze_text(guess_tool_name(&record.payload), &record.payload),
            (None, _) => None,
        }
    }
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::domain::analyzer::KnowledgeBase;
    use crate::domain::graph::{CRYPTO_AGENT_ID, GraphProjector, ORCHESTRATOR_ID, WEB_AGENT_ID};
    use crate::domain::telemetry::{EventKind, TelemetryEvent};

    fn inspector() -> StepInspector {
        StepInspector::new(PayloadAnalyzer::new(Arc::new(KnowledgeBase::builtin())))
    }

    fn event(kind: EventKind, data: serde_json::Value, ts: i64) -> TelemetryEvent {
        TelemetryEvent::new(kind, data.as_object().cloned().unwrap_or_default(), ts)
    }

    fn flags(inspection: &StepInspection) -> Vec<&str> {
        inspection
            .analysis
            .as_ref()
            .map(|a| a.detected.iter().map(|d| d.flag.as_str()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_unknown_node_is_none() {
        let graph = GraphProjector::project(&[]);
        assert!(inspector().inspect(&graph, "tool_999").is_none());
    }

    #[test]
    fn test_node_without_record_gets_placeholders() {
        let graph = GraphProjector::project(&[]);
        let inspection = inspector().inspect(&graph, CRYPTO_AGENT_ID).unwrap();
        assert_eq!(inspection.title, "Crypto Agent");
        assert_eq!(inspection.payload, NO_PAYLOAD);
        assert_eq!(inspection.logs, NO_LOGS);
        assert_eq!(inspection.conclusion, NO_CONCLUSION);
        assert!(inspection.thought.is_none());
        assert!(inspection.analysis.is_none());
    }

    #[test]
    fn test_tool_node_uses_explicit_identity() {
        let graph = GraphProjector::project(&[
            event(
                EventKind::OrchestratorMessage,
                json!({"tool_calls": [{"name": "kali_nmap", "args": {"command": "nmap -sV -Pn 10.0.0.1"}}]}),
                10,
            ),
            event(
                EventKind::ToolResult,
                json!({"tool_name": "kali_nmap", "content": "22/tcp open"}),
                11,
            ),
        ]);
        let inspection = inspector().inspect(&graph, "tool_10").unwrap();
        assert_eq!(inspection.title, "kali_nmap");
        assert_eq!(inspection.logs, "22/tcp open");
        assert_eq!(inspection.conclusion, "Tool returned successfully.");
        let analysis = inspection.analysis.as_ref().unwrap();
        assert_eq!(analysis.anatomy.name, "Nmap (Network Mapper)");
        assert_eq!(flags(&inspection), ["-sV", "-Pn"]);
    }

    #[test]
    fn test_identity_beats_payload_guess() {
        // The command mentions nmap, but the call is sqlmap
        let graph = GraphProjector::project(&[event(
            EventKind::OrchestratorMessage,
            json!({"tool_calls": [{"name": "kali_sqlmap", "args": {"command": "sqlmap -u http://nmap.local --dbs"}}]}),
            5,
        )]);
        let inspection = inspector().inspect(&graph, "tool_5").unwrap();
        assert_eq!(flags(&inspection), ["-u", "--dbs"]);
        assert_eq!(inspection.logs, "Executing...");
    }

    #[test]
    fn test_worker_aggregate_falls_back_to_guess() {
        let graph = GraphProjector::project(&[event(
            EventKind::OrchestratorMessage,
            json!({"tool_calls": [{"name": "kali_sqlmap", "args": {"command": "sqlmap -u x --batch"}}]}),
            5,
        )]);
        let inspection = inspector().inspect(&graph, WEB_AGENT_ID).unwrap();
        let analysis = inspection.analysis.as_ref().unwrap();
        assert_eq!(analysis.anatomy.name, "SQLMap (Automated SQL Injection)");
        assert_eq!(flags(&inspection), ["-u", "--batch"]);
    }

    #[test]
    fn test_orchestrator_thought_is_split_from_conclusion() {
        let graph = GraphProjector::project(&[event(
            EventKind::OrchestratorMessage,
            json!({"content": "<thought>Check ports first</thought> Running nmap now."}),
            1,
        )]);
        let inspection = inspector().inspect(&graph, ORCHESTRATOR_ID).unwrap();
        assert_eq!(inspection.thought.as_deref(), Some("Check ports first"));
        assert_eq!(inspection.conclusion, "Running nmap now.");
        // reasoning records get no flag analysis
        assert!(inspection.analysis.is_none());
        assert_eq!(inspection.logs, NO_LOGS);
    }
}
