//! Chat transcript endpoint

use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::domain::{ChatMessage, DashboardService};

pub async fn transcript(State(dashboard): State<Arc<DashboardService>>) -> Json<Vec<ChatMessage>> {
    Json(dashboard.transcript())
}
