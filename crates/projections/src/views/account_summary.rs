//! Account summary read model: one row per account with balance and counters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AccountEvent, Aggregate, BankAccount, Money, Projection};
use event_store::{EventEnvelope, Version};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;

/// Denormalized view of one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub account_id: AggregateId,
    pub account_holder: String,
    pub currency: String,
    pub balance: Money,
    pub deposit_count: u64,
    pub withdrawal_count: u64,
    pub transfers_out: u64,
    pub transfers_in: u64,
    /// Every event counts, the opening one included.
    pub total_transactions: u64,
    pub total_interest_earned: Money,
    pub closed: bool,
    pub opened_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub projected_version: Version,
}

/// Read model view over the account stream.
#[derive(Clone, Default)]
pub struct AccountSummaryView {
    accounts: Arc<RwLock<HashMap<AggregateId, AccountSummary>>>,
}

impl AccountSummaryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, account_id: &AggregateId) -> Option<AccountSummary> {
        self.accounts.read().await.get(account_id).cloned()
    }

    pub async fn balance(&self, account_id: &AggregateId) -> Option<Money> {
        self.accounts
            .read()
            .await
            .get(account_id)
            .map(|summary| summary.balance)
    }

    /// Open accounts ordered by balance, highest first. Ties break on id.
    pub async fn top_by_balance(&self, limit: usize) -> Vec<AccountSummary> {
        let mut open: Vec<AccountSummary> = self
            .accounts
            .read()
            .await
            .values()
            .filter(|summary| !summary.closed)
            .cloned()
            .collect();
        open.sort_by(|a, b| {
            b.balance
                .cmp(&a.balance)
                .then_with(|| a.account_id.cmp(&b.account_id))
        });
        open.truncate(limit);
        open
    }

    pub async fn count(&self) -> usize {
        self.accounts.read().await.len()
    }
}

#[async_trait]
impl Projection for AccountSummaryView {
    fn name(&self) -> &'static str {
        "AccountSummaryView"
    }

    async fn project(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != BankAccount::aggregate_type() {
            return Ok(());
        }

        let account_event: AccountEvent = serde_json::from_value(event.payload.clone())?;
        let mut accounts = self.accounts.write().await;

        if let AccountEvent::AccountOpened {
            account_holder,
            initial_balance,
            currency,
        } = &account_event
        {
            if accounts.contains_key(&event.aggregate_id) {
                return Ok(());
            }
            accounts.insert(
                event.aggregate_id.clone(),
                AccountSummary {
                    account_id: event.aggregate_id.clone(),
                    account_holder: account_holder.clone(),
                    currency: currency.clone(),
                    balance: *initial_balance,
                    deposit_count: 0,
                    withdrawal_count: 0,
                    transfers_out: 0,
                    transfers_in: 0,
                    total_transactions: 1,
                    total_interest_earned: Money::zero(),
                    closed: false,
                    opened_at: event.occurred_at,
                    last_activity_at: event.occurred_at,
                    projected_version: event.version,
                },
            );
            return Ok(());
        }

        let Some(summary) = accounts.get_mut(&event.aggregate_id) else {
            tracing::warn!(
                account_id = %event.aggregate_id,
                event_type = %event.event_type,
                "event for unknown account"
            );
            return Ok(());
        };
        if event.version <= summary.projected_version {
            return Ok(());
        }

        summary.balance = summary.balance.saturating_add(account_event.balance_delta());
        match &account_event {
            AccountEvent::AccountOpened { .. } => {}
            AccountEvent::FundsDeposited { .. } => summary.deposit_count += 1,
            AccountEvent::FundsWithdrawn { .. } => summary.withdrawal_count += 1,
            AccountEvent::FundsTransferredOut { .. } => summary.transfers_out += 1,
            AccountEvent::FundsTransferredIn { .. } => summary.transfers_in += 1,
            AccountEvent::InterestAccrued { amount } => {
                summary.total_interest_earned = summary.total_interest_earned.saturating_add(*amount)
            }
            AccountEvent::AccountClosed => summary.closed = true,
        }
        summary.total_transactions += 1;
        summary.last_activity_at = event.occurred_at;
        summary.projected_version = event.version;

        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.accounts.write().await.clear();
        Ok(())
    }
}
