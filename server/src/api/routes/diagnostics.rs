//! Ingest and projection counters

use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::domain::{DashboardService, Diagnostics};

pub async fn diagnostics(State(dashboard): State<Arc<DashboardService>>) -> Json<Diagnostics> {
    Json(dashboard.diagnostics())
}
