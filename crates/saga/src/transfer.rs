//! Fund transfer between two accounts as a saga.
//!
//! Each leg is its own aggregate command, so a failed credit leaves a debit
//! that has to be reversed by a compensating deposit.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::AggregateId;
use domain::{AccountService, Money};
use event_store::{EventStore, SnapshotStore};

use crate::context::SagaContext;
use crate::error::Result;
use crate::log::SagaLog;
use crate::orchestrator::SagaOrchestrator;
use crate::step::SagaStep;

pub const FUND_TRANSFER: &str = "FUND_TRANSFER";

pub const DEBIT_SOURCE: &str = "DEBIT_SOURCE";
pub const CREDIT_TARGET: &str = "CREDIT_TARGET";
pub const RECORD_TRANSFER: &str = "RECORD_TRANSFER";

const SOURCE_KEY: &str = "sourceAccountId";
const TARGET_KEY: &str = "targetAccountId";
const AMOUNT_KEY: &str = "amount";

const REVERSAL_DESCRIPTION: &str = "Reversal: transfer compensation";

struct TransferRequest {
    source: AggregateId,
    target: AggregateId,
    amount: Money,
}

impl TransferRequest {
    fn from_context(context: &SagaContext) -> Result<Self> {
        Ok(Self {
            source: AggregateId::new(context.require::<String>(SOURCE_KEY)?),
            target: AggregateId::new(context.require::<String>(TARGET_KEY)?),
            amount: context.require(AMOUNT_KEY)?,
        })
    }
}

/// Withdraws the amount from the source as an outgoing transfer.
pub struct DebitSource<S: EventStore + SnapshotStore> {
    accounts: Arc<AccountService<S>>,
}

#[async_trait]
impl<S: EventStore + SnapshotStore + 'static> SagaStep for DebitSource<S> {
    fn name(&self) -> &str {
        DEBIT_SOURCE
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<()> {
        let req = TransferRequest::from_context(context)?;
        let description = format!("Transfer to {}", req.target);
        self.accounts
            .transfer_out(&req.source, req.amount, &req.target, &description)
            .await?;
        Ok(())
    }

    async fn compensate(&self, context: &SagaContext) -> Result<()> {
        let req = TransferRequest::from_context(context)?;
        self.accounts
            .deposit(&req.source, req.amount, REVERSAL_DESCRIPTION)
            .await?;
        Ok(())
    }
}

/// Credits the target as an incoming transfer.
pub struct CreditTarget<S: EventStore + SnapshotStore> {
    accounts: Arc<AccountService<S>>,
}

#[async_trait]
impl<S: EventStore + SnapshotStore + 'static> SagaStep for CreditTarget<S> {
    fn name(&self) -> &str {
        CREDIT_TARGET
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<()> {
        let req = TransferRequest::from_context(context)?;
        let description = format!("Transfer from {}", req.source);
        self.accounts
            .receive_transfer(&req.target, req.amount, &req.source, &description)
            .await?;
        Ok(())
    }

    async fn compensate(&self, context: &SagaContext) -> Result<()> {
        let req = TransferRequest::from_context(context)?;
        self.accounts
            .withdraw(&req.target, req.amount, REVERSAL_DESCRIPTION)
            .await?;
        Ok(())
    }
}

/// Confirmation point. Both ledger legs were already projected by the
/// command path; this step only stamps the completion time.
pub struct RecordTransfer;

#[async_trait]
impl SagaStep for RecordTransfer {
    fn name(&self) -> &str {
        RECORD_TRANSFER
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<()> {
        context.put("recordedAt", Utc::now())
    }

    async fn compensate(&self, _context: &SagaContext) -> Result<()> {
        Ok(())
    }
}

/// Runs `DEBIT_SOURCE, CREDIT_TARGET, RECORD_TRANSFER`.
pub struct TransferSaga<S: EventStore + SnapshotStore> {
    orchestrator: SagaOrchestrator,
    accounts: Arc<AccountService<S>>,
}

impl<S: EventStore + SnapshotStore + 'static> TransferSaga<S> {
    pub fn new(orchestrator: SagaOrchestrator, accounts: Arc<AccountService<S>>) -> Self {
        Self {
            orchestrator,
            accounts,
        }
    }

    fn steps(&self) -> Vec<Box<dyn SagaStep>> {
        vec![
            Box::new(DebitSource {
                accounts: self.accounts.clone(),
            }),
            Box::new(CreditTarget {
                accounts: self.accounts.clone(),
            }),
            Box::new(RecordTransfer),
        ]
    }

    #[tracing::instrument(skip(self), fields(%source, %target, %amount))]
    pub async fn transfer(
        &self,
        source: &AggregateId,
        target: &AggregateId,
        amount: Money,
    ) -> Result<SagaLog> {
        let context = SagaContext::new()
            .with(SOURCE_KEY, source.as_str())?
            .with(TARGET_KEY, target.as_str())?
            .with(AMOUNT_KEY, amount)?;

        self.orchestrator
            .execute(FUND_TRANSFER, &self.steps(), context)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemorySagaLogRepository;
    use crate::state::{SagaStatus, StepStatus};
    use domain::CommandService;
    use event_store::InMemoryEventStore;

    fn saga() -> (TransferSaga<InMemoryEventStore>, Arc<AccountService<InMemoryEventStore>>) {
        let accounts = Arc::new(AccountService::new(CommandService::new(
            InMemoryEventStore::new(),
        )));
        let orchestrator = SagaOrchestrator::new(Arc::new(InMemorySagaLogRepository::new()));
        (TransferSaga::new(orchestrator, accounts.clone()), accounts)
    }

    #[tokio::test]
    async fn missing_amount_fails_first_step() {
        let (saga, _) = saga();
        let log = saga
            .orchestrator
            .execute(
                FUND_TRANSFER,
                &saga.steps(),
                SagaContext::new()
                    .with(SOURCE_KEY, "A")
                    .unwrap()
                    .with(TARGET_KEY, "B")
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(log.status, SagaStatus::Compensated);
        assert_eq!(log.steps[0].status, StepStatus::Failed);
        assert_eq!(
            log.failure_reason.as_deref(),
            Some("Missing saga context key: amount")
        );
    }

    #[tokio::test]
    async fn unknown_source_account_is_compensated() {
        let (saga, accounts) = saga();
        let target = AggregateId::new("ACC-B");
        accounts
            .open(target.clone(), "Lee", Money::from_cents(100), "TWD")
            .await
            .unwrap();

        let log = saga
            .transfer(&AggregateId::new("ACC-X"), &target, Money::from_cents(50))
            .await
            .unwrap();

        assert_eq!(log.status, SagaStatus::Compensated);
        assert_eq!(accounts.balance(&target).await.unwrap(), Money::from_cents(100));
    }
}
