//! Claim command endpoints, the settlement saga trigger and claim read models.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::AggregateId;
use domain::{ClaimProcess, ClaimStatus, CommandResult, FraudRisk, Money};
use event_store::{EventStore, SnapshotStore};
use projections::{CategoryStatistics, ClaimSummary};
use saga::SagaLog;
use serde::{Deserialize, Serialize};

use super::id_or_generate;
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct FileClaimRequest {
    pub claim_id: Option<String>,
    pub policy_id: String,
    pub claimant_name: String,
    pub category: String,
    pub claimed_amount: Money,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct InvestigateRequest {
    pub investigator: String,
    #[serde(default)]
    pub findings: String,
    pub fraud_risk: FraudRisk,
}

#[derive(Deserialize)]
pub struct AssessRequest {
    pub assessed_amount: Money,
    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct SettleRequest {
    pub approved_amount: Money,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub claim_id: String,
    pub policy_id: String,
    pub category: String,
    pub status: ClaimStatus,
    pub claimed_amount: Money,
    pub assessed_amount: Option<Money>,
    pub fraud_risk: Option<FraudRisk>,
    pub version: i64,
}

impl From<&CommandResult<ClaimProcess>> for ClaimResponse {
    fn from(result: &CommandResult<ClaimProcess>) -> Self {
        let claim = result.state();
        Self {
            claim_id: result.root.id().to_string(),
            policy_id: claim.policy_id().to_string(),
            category: claim.category().to_string(),
            status: claim.status(),
            claimed_amount: claim.claimed_amount(),
            assessed_amount: claim.assessed_amount(),
            fraud_risk: claim.fraud_risk(),
            version: result.version().as_i64(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    #[serde(flatten)]
    pub statistics: CategoryStatistics,
    pub approval_rate: f64,
}

// -- Handlers --

/// POST /claims
pub async fn file<S>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<FileClaimRequest>,
) -> Result<(StatusCode, Json<ClaimResponse>), ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let claim_id = id_or_generate(req.claim_id)?;
    let result = state
        .claims
        .file(
            claim_id,
            &req.policy_id,
            &req.claimant_name,
            &req.category,
            req.claimed_amount,
            &req.description,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ClaimResponse::from(&result))))
}

/// GET /claims/{id}
pub async fn get<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ClaimSummary>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    state
        .claim_dashboard
        .get(&AggregateId::new(&id))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Claim {id} not found")))
}

/// POST /claims/{id}/investigate
pub async fn investigate<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<InvestigateRequest>,
) -> Result<Json<ClaimResponse>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let result = state
        .claims
        .investigate(
            &AggregateId::new(id),
            &req.investigator,
            &req.findings,
            req.fraud_risk,
        )
        .await?;
    Ok(Json(ClaimResponse::from(&result)))
}

/// POST /claims/{id}/assess
pub async fn assess<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AssessRequest>,
) -> Result<Json<ClaimResponse>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let result = state
        .claims
        .assess(&AggregateId::new(id), req.assessed_amount, &req.notes)
        .await?;
    Ok(Json(ClaimResponse::from(&result)))
}

/// POST /claims/{id}/reject
pub async fn reject<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<ClaimResponse>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let result = state
        .claims
        .reject(&AggregateId::new(id), &req.reason)
        .await?;
    Ok(Json(ClaimResponse::from(&result)))
}

/// POST /claims/{id}/settle
///
/// Runs the settlement saga. A compensated saga is still a 200: the outcome
/// is in the returned log.
pub async fn settle<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<SettleRequest>,
) -> Result<Json<SagaLog>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let claim_id = AggregateId::new(id);
    let claim = state.claims.load(&claim_id).await?;
    let log = state
        .settlements
        .settle(
            &claim_id,
            claim.state().policy_id(),
            claim.state().category(),
            req.approved_amount,
        )
        .await?;
    Ok(Json(log))
}

/// GET /claims/statistics/{category}
pub async fn statistics<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(category): Path<String>,
) -> Result<Json<StatisticsResponse>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let statistics = state
        .claim_statistics
        .get(&category)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No claims in category {category}")))?;

    Ok(Json(StatisticsResponse {
        approval_rate: statistics.approval_rate(),
        statistics,
    }))
}
