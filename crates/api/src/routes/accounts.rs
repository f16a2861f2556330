//! Account command endpoints and the account read models.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::AggregateId;
use domain::{BankAccount, CommandResult, Money};
use event_store::{EventStore, SnapshotStore};
use projections::{AccountSummary, LedgerEntry, TransferNotification};
use serde::{Deserialize, Serialize};

use super::id_or_generate;
use crate::AppState;
use crate::error::ApiError;

const DEFAULT_TOP_LIMIT: usize = 10;

// -- Request types --

#[derive(Deserialize)]
pub struct OpenAccountRequest {
    pub account_id: Option<String>,
    pub account_holder: String,
    pub initial_balance: Money,
    pub currency: String,
}

#[derive(Deserialize)]
pub struct AmountRequest {
    pub amount: Money,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct TopQuery {
    pub limit: Option<usize>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account_id: String,
    pub account_holder: String,
    pub balance: Money,
    pub currency: String,
    pub closed: bool,
    pub version: i64,
}

impl From<&CommandResult<BankAccount>> for AccountResponse {
    fn from(result: &CommandResult<BankAccount>) -> Self {
        let account = result.state();
        Self {
            account_id: result.root.id().to_string(),
            account_holder: account.account_holder().to_string(),
            balance: account.balance(),
            currency: account.currency().to_string(),
            closed: account.is_closed(),
            version: result.version().as_i64(),
        }
    }
}

// -- Handlers --

/// POST /accounts
pub async fn open<S>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let account_id = id_or_generate(req.account_id)?;
    let result = state
        .accounts
        .open(
            account_id,
            &req.account_holder,
            req.initial_balance,
            &req.currency,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(AccountResponse::from(&result))))
}

/// GET /accounts/{id}
pub async fn get<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<AccountSummary>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    state
        .account_summary
        .get(&AggregateId::new(&id))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Account {id} not found")))
}

/// GET /accounts/top?limit=N
pub async fn top<S>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<TopQuery>,
) -> Json<Vec<AccountSummary>>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    Json(state.account_summary.top_by_balance(limit).await)
}

/// POST /accounts/{id}/deposit
pub async fn deposit<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<AccountResponse>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let description = req.description.as_deref().unwrap_or("Deposit");
    let result = state
        .accounts
        .deposit(&AggregateId::new(id), req.amount, description)
        .await?;
    Ok(Json(AccountResponse::from(&result)))
}

/// POST /accounts/{id}/withdraw
pub async fn withdraw<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<AccountResponse>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let description = req.description.as_deref().unwrap_or("Withdrawal");
    let result = state
        .accounts
        .withdraw(&AggregateId::new(id), req.amount, description)
        .await?;
    Ok(Json(AccountResponse::from(&result)))
}

/// POST /accounts/{id}/interest
pub async fn interest<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<AccountResponse>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let result = state
        .accounts
        .accrue_interest(&AggregateId::new(id), req.amount)
        .await?;
    Ok(Json(AccountResponse::from(&result)))
}

/// POST /accounts/{id}/close
pub async fn close<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let result = state.accounts.close(&AggregateId::new(id)).await?;
    Ok(Json(AccountResponse::from(&result)))
}

/// GET /accounts/{id}/ledger
pub async fn ledger<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let entries = state.ledger.entries_for(&AggregateId::new(&id)).await;
    if entries.is_empty() {
        return Err(ApiError::NotFound(format!("Account {id} not found")));
    }
    Ok(Json(entries))
}

/// GET /accounts/{id}/notifications
pub async fn notifications<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Json<Vec<TransferNotification>>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    Json(
        state
            .transfer_notifications
            .for_account(&AggregateId::new(id))
            .await,
    )
}
