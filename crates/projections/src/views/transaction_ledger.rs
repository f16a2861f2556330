//! Transaction ledger read model: one entry per account event, with a running
//! balance.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AccountEvent, Aggregate, BankAccount, Money, Projection};
use event_store::{EventEnvelope, EventId, Version};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    Opening,
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
    Interest,
    Closing,
}

impl LedgerEntryType {
    fn of(event: &AccountEvent) -> Self {
        match event {
            AccountEvent::AccountOpened { .. } => LedgerEntryType::Opening,
            AccountEvent::FundsDeposited { .. } => LedgerEntryType::Deposit,
            AccountEvent::FundsWithdrawn { .. } => LedgerEntryType::Withdrawal,
            AccountEvent::FundsTransferredOut { .. } => LedgerEntryType::TransferOut,
            AccountEvent::FundsTransferredIn { .. } => LedgerEntryType::TransferIn,
            AccountEvent::InterestAccrued { .. } => LedgerEntryType::Interest,
            AccountEvent::AccountClosed => LedgerEntryType::Closing,
        }
    }
}

/// A single ledger line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub event_id: EventId,
    pub account_id: AggregateId,
    pub version: Version,
    pub entry_type: LedgerEntryType,
    /// Signed amount: debits are negative.
    pub amount: Money,
    pub balance_after: Money,
    pub counterparty: Option<String>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Per-account list of ledger entries in version order.
#[derive(Clone, Default)]
pub struct TransactionLedgerView {
    entries: Arc<RwLock<HashMap<AggregateId, Vec<LedgerEntry>>>>,
}

impl TransactionLedgerView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries_for(&self, account_id: &AggregateId) -> Vec<LedgerEntry> {
        self.entries
            .read()
            .await
            .get(account_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of entries across all accounts.
    pub async fn len(&self) -> usize {
        self.entries.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Projection for TransactionLedgerView {
    fn name(&self) -> &'static str {
        "TransactionLedgerView"
    }

    async fn project(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != BankAccount::aggregate_type() {
            return Ok(());
        }

        let account_event: AccountEvent = serde_json::from_value(event.payload.clone())?;
        let mut entries = self.entries.write().await;
        let ledger = entries.entry(event.aggregate_id.clone()).or_default();

        let previous = ledger.last();
        if previous.is_some_and(|last| last.version >= event.version) {
            return Ok(());
        }
        let balance_before = previous.map_or(Money::zero(), |last| last.balance_after);

        let amount = account_event.balance_delta();
        let (counterparty, description) = match &account_event {
            AccountEvent::FundsDeposited { description, .. }
            | AccountEvent::FundsWithdrawn { description, .. } => (None, Some(description.clone())),
            AccountEvent::FundsTransferredOut {
                target_account_id,
                description,
                ..
            } => (Some(target_account_id.clone()), Some(description.clone())),
            AccountEvent::FundsTransferredIn {
                source_account_id,
                description,
                ..
            } => (Some(source_account_id.clone()), Some(description.clone())),
            AccountEvent::AccountOpened { .. }
            | AccountEvent::InterestAccrued { .. }
            | AccountEvent::AccountClosed => (None, None),
        };

        ledger.push(LedgerEntry {
            event_id: event.event_id,
            account_id: event.aggregate_id.clone(),
            version: event.version,
            entry_type: LedgerEntryType::of(&account_event),
            amount,
            balance_after: balance_before + amount,
            counterparty,
            description,
            occurred_at: event.occurred_at,
        });

        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}
