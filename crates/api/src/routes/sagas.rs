//! Fund transfer trigger and saga log lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::AggregateId;
use domain::Money;
use event_store::{EventStore, SnapshotStore};
use saga::SagaLog;
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct TransferRequest {
    pub source_account_id: String,
    pub target_account_id: String,
    pub amount: Money,
}

/// POST /transfers
///
/// Returns the saga log whether the transfer completed or was compensated.
pub async fn transfer<S>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<SagaLog>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    if req.source_account_id == req.target_account_id {
        return Err(ApiError::BadRequest(
            "source and target accounts must differ".into(),
        ));
    }

    let log = state
        .transfers
        .transfer(
            &AggregateId::new(req.source_account_id),
            &AggregateId::new(req.target_account_id),
            req.amount,
        )
        .await?;
    Ok(Json(log))
}

/// GET /sagas/{id}
pub async fn get<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaLog>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    Ok(Json(state.orchestrator.load(&id).await?))
}
