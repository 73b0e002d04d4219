//! Graph and step inspection endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::types::ApiError;
use crate::domain::{DashboardService, GraphData, StepInspection};

pub fn routes(dashboard: Arc<DashboardService>) -> Router {
    Router::new()
        .route("/", get(graph))
        .route("/steps/{node_id}", get(step))
        .with_state(dashboard)
}

pub async fn graph(State(dashboard): State<Arc<DashboardService>>) -> Json<GraphData> {
    Json(dashboard.graph())
}

/// Step detail for a node. Missing records yield placeholder text.
pub async fn step(
    State(dashboard): State<Arc<DashboardService>>,
    Path(node_id): Path<String>,
) -> Result<Json<StepInspection>, ApiError> {
    dashboard
        .inspect(&node_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("NODE_NOT_FOUND", format!("Unknown node: {}", node_id)))
}
