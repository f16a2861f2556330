//! Read model rebuild.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::{EventStore, SnapshotStore};

use crate::error::ApiError;
use crate::{AppState, RebuildReport};

/// POST /projections/rebuild
///
/// Resets every view and replays the account and claim streams.
pub async fn rebuild<S>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<RebuildReport>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let report = state.rebuild_projections().await?;
    tracing::info!(
        account_events = report.account_events,
        claim_events = report.claim_events,
        order_events = report.order_events,
        "projections rebuilt on request"
    );
    Ok(Json(report))
}
