//! Claim service providing one method per claim command.

use common::AggregateId;
use event_store::{EventStore, SnapshotStore};

use crate::command::{CommandResult, CommandService};
use crate::error::DomainError;
use crate::money::Money;
use crate::root::AggregateRoot;

use super::{ClaimProcess, FraudRisk};

/// Service for managing insurance claims.
pub struct ClaimService<S: EventStore + SnapshotStore> {
    commands: CommandService<S, ClaimProcess>,
}

impl<S: EventStore + SnapshotStore> ClaimService<S> {
    pub fn new(commands: CommandService<S, ClaimProcess>) -> Self {
        Self { commands }
    }

    /// Returns a reference to the underlying command service.
    pub fn commands(&self) -> &CommandService<S, ClaimProcess> {
        &self.commands
    }

    #[tracing::instrument(skip(self, description))]
    pub async fn file(
        &self,
        claim_id: AggregateId,
        policy_id: &str,
        claimant_name: &str,
        category: &str,
        claimed_amount: Money,
        description: &str,
    ) -> Result<CommandResult<ClaimProcess>, DomainError> {
        self.commands
            .create(claim_id, |c| {
                c.file(
                    policy_id,
                    claimant_name,
                    category,
                    claimed_amount,
                    description,
                )
            })
            .await
    }

    #[tracing::instrument(skip(self, findings))]
    pub async fn investigate(
        &self,
        claim_id: &AggregateId,
        investigator: &str,
        findings: &str,
        fraud_risk: FraudRisk,
    ) -> Result<CommandResult<ClaimProcess>, DomainError> {
        self.commands
            .execute(claim_id, |c| c.investigate(investigator, findings, fraud_risk))
            .await
    }

    #[tracing::instrument(skip(self, notes))]
    pub async fn assess(
        &self,
        claim_id: &AggregateId,
        amount: Money,
        notes: &str,
    ) -> Result<CommandResult<ClaimProcess>, DomainError> {
        self.commands
            .execute(claim_id, |c| c.assess(amount, notes))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn approve(
        &self,
        claim_id: &AggregateId,
        amount: Money,
    ) -> Result<CommandResult<ClaimProcess>, DomainError> {
        self.commands.execute(claim_id, |c| c.approve(amount)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reject(
        &self,
        claim_id: &AggregateId,
        reason: &str,
    ) -> Result<CommandResult<ClaimProcess>, DomainError> {
        self.commands.execute(claim_id, |c| c.reject(reason)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn pay(
        &self,
        claim_id: &AggregateId,
        amount: Money,
        payment_reference: &str,
    ) -> Result<CommandResult<ClaimProcess>, DomainError> {
        self.commands
            .execute(claim_id, |c| c.pay(amount, payment_reference))
            .await
    }

    pub async fn load(
        &self,
        claim_id: &AggregateId,
    ) -> Result<AggregateRoot<ClaimProcess>, DomainError> {
        self.commands.load(claim_id).await
    }
}
