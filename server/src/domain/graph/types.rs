//! Graph projection types.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Orchestrator,
    Worker,
    Tool,
}

impl NodeKind {
    pub fn is_agent(&self) -> bool {
        matches!(self, Self::Orchestrator | Self::Worker)
    }
}

/// Node lifecycle. Tool nodes go `running -> success | error`; agents reach
/// `success` only through session termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Error,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// Layout hint. Only the vertical stacking of tool nodes is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub status: NodeStatus,
    pub label: String,
    pub details: String,
    pub position: Position,
}

/// Visual state of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeState {
    /// Dashed: not used yet, or stopped by termination before a result
    Idle,
    Active,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Animated in the UI
    pub active: bool,
    pub state: EdgeState,
}

/// Inspectable payload, logs and conclusion of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub title: String,
    pub payload: String,
    pub logs: String,
    pub conclusion: String,
    /// Tool that produced this record, when it is a single tool invocation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<JsonValue>,
}

/// Snapshot of the projected graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphData {
    /// Creation order
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Keyed by node id
    pub steps: BTreeMap<String, StepRecord>,
}

impl GraphData {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// First edge pointing at `target`.
    pub fn edge_to(&self, target: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.target == target)
    }

    pub fn step(&self, id: &str) -> Option<&StepRecord> {
        self.steps.get(id)
    }

    pub fn tool_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Tool)
    }
}
