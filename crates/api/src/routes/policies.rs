//! Policy registration and lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{Money, Policy, PolicyDocument};
use event_store::{EventStore, SnapshotStore};
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct PolicyResponse {
    pub id: String,
    pub policy_type: &'static str,
    pub holder_name: String,
    pub coverage_limit: Money,
    pub total_claims_paid: Money,
    pub body: serde_json::Value,
}

impl PolicyResponse {
    fn new(id: String, policy: &Policy) -> Result<Self, ApiError> {
        let document = policy.to_document(id.clone())?;
        Ok(Self {
            id,
            policy_type: policy.policy_type(),
            holder_name: policy.holder_name().to_string(),
            coverage_limit: policy.coverage_limit(),
            total_claims_paid: policy.total_claims_paid(),
            body: document.body,
        })
    }
}

/// POST /policies
///
/// The body is a stored policy document; `policy_type` must name a
/// registered type and `body` must decode as that type.
pub async fn register<S>(
    State(state): State<Arc<AppState<S>>>,
    Json(document): Json<PolicyDocument>,
) -> Result<(StatusCode, Json<PolicyResponse>), ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    if document.id.trim().is_empty() {
        return Err(ApiError::BadRequest("policy id must not be blank".into()));
    }
    let id = document.id.clone();
    let policy = state.policies.register_document(document).await?;
    Ok((StatusCode::CREATED, Json(PolicyResponse::new(id, &policy)?)))
}

/// GET /policies/{id}
pub async fn get<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PolicyResponse>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let policy = state.policies.get(&id).await?;
    Ok(Json(PolicyResponse::new(id, &policy)?))
}
