//! Telemetry-to-graph projection
//!
//! Folds the ordered event log into agent/tool nodes, edges and per-node step
//! records. The fold is total: every event sequence yields a valid graph, and
//! events are never rejected, retried or reordered.
//!
//! # Incremental fold
//!
//! [`GraphProjector::apply`] advances the projection by one event. Folding a
//! log event by event from [`GraphProjector::new`] is exactly the same as
//! [`GraphProjector::project`] over the whole log, so callers may keep a live
//! projector instead of re-deriving on every update.
//!
//! # Simplifications
//!
//! - Only the first entry of `tool_calls` becomes a tool node. Every call is
//!   still listed in the worker's aggregate step record.
//! - Tool calls are always routed to [`TARGET_WORKER_ID`].
//! - A `tool_result` completes the most recently created tool node that is
//!   still running. Results with no running node are counted as orphans and
//!   otherwise ignored.

mod types;


use std::collections::BTreeMap;

use chrono::DateTime;

use super::telemetry::{EventKind, TelemetryEvent, ToolCall};

pub use types::{
    EdgeState, GraphData, GraphEdge, GraphNode, NodeKind, NodeStatus, Position, StepRecord,
};

// ============================================================================
// CONSTANTS
// ============================================================================

pub const ORCHESTRATOR_ID: &str = "orchestrator";
pub const WEB_AGENT_ID: &str = "web_agent";
pub const CRYPTO_AGENT_ID: &str = "crypto_agent";

/// Worker every tool call is attributed to
pub const TARGET_WORKER_ID: &str = WEB_AGENT_ID;

/// Substring of a warning `system_message` that ends the session
pub const TERMINATION_MARKER: &str = "Terminated";
const TERMINATION_LEVEL: &str = "warning";

pub const TOOL_PENDING_LOGS: &str = "Executing...";
pub const TOOL_PENDING_CONCLUSION: &str = "Pending...";
pub const TOOL_SUCCESS_CONCLUSION: &str = "Tool returned successfully.";
pub const TOOL_ERROR_CONCLUSION: &str = "Tool execution encountered an error.";

const TOOL_COLUMN_X: i64 = 100;
const TOOL_FIRST_Y: i64 = 350;
const TOOL_ROW_SPACING: i64 = 150;

// ============================================================================
// PROJECTOR
// ============================================================================

/// Graph accumulator. Start from [`GraphProjector::new`] and feed events in
/// log order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphProjector {
    graph: GraphData,
    next_tool_y: i64,
    orphan_results: u64,
    terminated: bool,
}

impl Default for GraphProjector {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphProjector {
    /// Projector holding only the seed graph.
    pub fn new() -> Self {
        Self {
            graph: seed_graph(),
            next_tool_y: TOOL_FIRST_Y,
            orphan_results: 0,
            terminated: false,
        }
    }

    /// Project a whole log from the seed graph.
    pub fn project(events: &[TelemetryEvent]) -> GraphData {
        events.iter().fold(Self::new(), Self::fold).into_graph()
    }

    /// `(prior, event) -> next`
    pub fn fold(mut self, event: &TelemetryEvent) -> Self {
        self.apply(event);
        self
    }

    /// Advance the projection by one event.
    pub fn apply(&mut self, event: &TelemetryEvent) {
        match event.kind {
            EventKind::OrchestratorMessage => self.on_orchestrator_message(event),
            EventKind::ToolResult => self.on_tool_result(event),
            EventKind::SystemMessage => self.on_system_message(event),
            EventKind::Ack => {}
        }
    }

    pub fn graph(&self) -> &GraphData {
        &self.graph
    }

    pub fn into_graph(self) -> GraphData {
        self.graph
    }

    /// Results that arrived while no tool node was running.
    pub fn orphan_results(&self) -> u64 {
        self.orphan_results
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    // ------------------------------------------------------------------------
    // Event handlers
    // ------------------------------------------------------------------------

    fn on_orchestrator_message(&mut self, event: &TelemetryEvent) {
        let msg = event.orchestrator_message();

        self.mark_agent_running(ORCHESTRATOR_ID, "Thinking / Delegating");
        if let Some(content) = &msg.content {
            self.record_reasoning(content);
        }

        let Some(first) = msg.tool_calls.first() else {
            return;
        };

        self.mark_agent_running(TARGET_WORKER_ID, &format!("Executing {}", first.name));
        if let Some(edge) = self
            .graph
            .edges
            .iter_mut()
            .find(|e| e.source == ORCHESTRATOR_ID && e.target == TARGET_WORKER_ID)
        {
            edge.active = true;
            edge.state = EdgeState::Active;
        }

        let tool_id = self.unique_node_id(format!("tool_{}", event.timestamp));
        self.graph.nodes.push(GraphNode {
            id: tool_id.clone(),
            kind: NodeKind::Tool,
            status: NodeStatus::Running,
            label: format!("Tool: {}", first.name),
            details: "Invoked with arguments".to_string(),
            position: Position {
                x: TOOL_COLUMN_X,
                y: self.next_tool_y,
            },
        });
        self.next_tool_y += TOOL_ROW_SPACING;

        self.graph.edges.push(GraphEdge {
            id: format!("e-{}-{}", TARGET_WORKER_ID, tool_id),
            source: TARGET_WORKER_ID.to_string(),
            target: tool_id.clone(),
            active: true,
            state: EdgeState::Active,
        });

        self.graph.steps.insert(
            tool_id,
            StepRecord {
                title: first.name.clone(),
                payload: first.payload_text(),
                logs: TOOL_PENDING_LOGS.to_string(),
                conclusion: TOOL_PENDING_CONCLUSION.to_string(),
                tool_name: Some(first.name.clone()),
                args: Some(first.args.clone()),
            },
        );

        self.record_worker_calls(TARGET_WORKER_ID, &msg.tool_calls);
    }

    fn on_tool_result(&mut self, event: &TelemetryEvent) {
        let result = event.tool_result();

        let Some(node) = self
            .graph
            .nodes
            .iter_mut()
            .rev()
            .find(|n| n.kind == NodeKind::Tool && n.status == NodeStatus::Running)
        else {
            self.orphan_results += 1;
            tracing::debug!(
                tool = %result.tool_name,
                timestamp = event.timestamp,
                orphans = self.orphan_results,
                "Tool result with no running tool node"
            );
            return;
        };

        let (status, details, edge_state, conclusion) = if result.is_error {
            (
                NodeStatus::Error,
                "Execution failed",
                EdgeState::Error,
                TOOL_ERROR_CONCLUSION,
            )
        } else {
            (
                NodeStatus::Success,
                "Execution succeeded",
                EdgeState::Success,
                TOOL_SUCCESS_CONCLUSION,
            )
        };
        node.status = status;
        node.details = details.to_string();
        let tool_id = node.id.clone();

        let mut worker_id = None;
        if let Some(edge) = self.graph.edges.iter_mut().find(|e| e.target == tool_id) {
            edge.active = false;
            edge.state = edge_state;
            worker_id = Some(edge.source.clone());
        }

        let mut tool_title = result.tool_name.clone();
        if let Some(step) = self.graph.steps.get_mut(&tool_id) {
            if step.logs == TOOL_PENDING_LOGS {
                step.logs = result.content.clone();
            } else {
                append_line(&mut step.logs, &result.content);
            }
            step.conclusion = conclusion.to_string();
            tool_title = step.title.clone();
        }

        if let Some(worker_id) = worker_id
            && let Some(aggregate) = self.graph.steps.get_mut(&worker_id)
        {
            append_line(
                &mut aggregate.logs,
                &format!("[{}] {}", tool_title, result.content),
            );
            aggregate.conclusion = conclusion.to_string();
        }
    }

    fn on_system_message(&mut self, event: &TelemetryEvent) {
        let msg = event.system_message();
        if msg.level != TERMINATION_LEVEL || !msg.content.contains(TERMINATION_MARKER) {
            return;
        }

        for node in &mut self.graph.nodes {
            let details = match node.kind {
                NodeKind::Orchestrator => "Analysis Complete",
                NodeKind::Worker => "Task Complete",
                NodeKind::Tool => continue,
            };
            node.status = NodeStatus::Success;
            node.details = details.to_string();
        }
        // Finished edges keep their result colour
        for edge in &mut self.graph.edges {
            edge.active = false;
            if edge.state == EdgeState::Active {
                edge.state = EdgeState::Idle;
            }
        }

        if !self.terminated {
            tracing::debug!(
                at = %DateTime::from_timestamp_millis(event.timestamp)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default(),
                "Session terminated"
            );
        }
        self.terminated = true;
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Agents never leave `success` once the session has terminated.
    fn mark_agent_running(&mut self, id: &str, details: &str) {
        if let Some(node) = self.graph.nodes.iter_mut().find(|n| n.id == id)
            && !node.status.is_terminal()
        {
            node.status = NodeStatus::Running;
            node.details = details.to_string();
        }
    }

    fn record_reasoning(&mut self, content: &str) {
        let record = self
            .graph
            .steps
            .entry(ORCHESTRATOR_ID.to_string())
            .or_insert_with(|| StepRecord {
                title: "ReAct Orchestrator".to_string(),
                payload: String::new(),
                logs: String::new(),
                conclusion: String::new(),
                tool_name: None,
                args: None,
            });
        append_line(&mut record.payload, content);
        record.conclusion = content.to_string();
    }

    fn record_worker_calls(&mut self, worker_id: &str, calls: &[ToolCall]) {
        let title = self
            .graph
            .node(worker_id)
            .map(|n| n.label.clone())
            .unwrap_or_else(|| worker_id.to_string());
        let record = self
            .graph
            .steps
            .entry(worker_id.to_string())
            .or_insert_with(|| StepRecord {
                title,
                payload: String::new(),
                logs: String::new(),
                conclusion: TOOL_PENDING_CONCLUSION.to_string(),
                tool_name: None,
                args: None,
            });
        for call in calls {
            append_line(&mut record.payload, &call.payload_text());
        }
        record.conclusion = TOOL_PENDING_CONCLUSION.to_string();
    }

    /// `base`, or `base_<n>` for the first free `n` when a hand-built log
    /// repeats a timestamp.
    fn unique_node_id(&self, base: String) -> String {
        if self.graph.node(&base).is_none() {
            return base;
        }
        (1..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| self.graph.node(candidate).is_none())
            .unwrap_or(base)
    }
}

fn append_line(buf: &mut String, line: &str) {
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(line);
}

fn agent_node(
    id: &str,
    kind: NodeKind,
    status: NodeStatus,
    label: &str,
    details: &str,
    x: i64,
    y: i64,
) -> GraphNode {
    GraphNode {
        id: id.to_string(),
        kind,
        status,
        label: label.to_string(),
        details: details.to_string(),
        position: Position { x, y },
    }
}

fn seed_edge(id: &str, target: &str) -> GraphEdge {
    GraphEdge {
        id: id.to_string(),
        source: ORCHESTRATOR_ID.to_string(),
        target: target.to_string(),
        active: false,
        state: EdgeState::Idle,
    }
}

/// Orchestrator, two workers, and a dashed edge to each worker.
fn seed_graph() -> GraphData {
    GraphData {
        nodes: vec![
            agent_node(
                ORCHESTRATOR_ID,
                NodeKind::Orchestrator,
                NodeStatus::Running,
                "ReAct Orchestrator",
                "Awaiting instructions",
                250,
                50,
            ),
            agent_node(
                WEB_AGENT_ID,
                NodeKind::Worker,
                NodeStatus::Pending,
                "Web Agent",
                "Awaiting tasks",
                100,
                200,
            ),
            agent_node(
                CRYPTO_AGENT_ID,
                NodeKind::Worker,
                NodeStatus::Pending,
                "Crypto Agent",
                "Awaiting tasks",
                400,
                200,
            ),
        ],
        edges: vec![
            seed_edge("e-orch-web", WEB_AGENT_ID),
            seed_edge("e-orch-crypto", CRYPTO_AGENT_ID),
        ],
        steps: BTreeMap::new(),
    }
}
