//! Liveness endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::{EventStore, SnapshotStore};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub accounts: usize,
    pub claims: usize,
    pub orders: usize,
}

/// GET /health: process is up, with read model sizes.
pub async fn check<S>(State(state): State<Arc<AppState<S>>>) -> Json<HealthResponse>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        accounts: state.account_summary.count().await,
        claims: state.claim_dashboard.count().await,
        orders: state.order_dashboard.count().await,
    })
}
