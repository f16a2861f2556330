//! Account service providing one method per account command.

use common::AggregateId;
use event_store::{EventStore, SnapshotStore};

use crate::command::{CommandResult, CommandService};
use crate::error::DomainError;
use crate::money::Money;
use crate::root::AggregateRoot;

use super::BankAccount;

/// Service for managing bank accounts.
pub struct AccountService<S: EventStore + SnapshotStore> {
    commands: CommandService<S, BankAccount>,
}

impl<S: EventStore + SnapshotStore> AccountService<S> {
    pub fn new(commands: CommandService<S, BankAccount>) -> Self {
        Self { commands }
    }

    /// Returns a reference to the underlying command service.
    pub fn commands(&self) -> &CommandService<S, BankAccount> {
        &self.commands
    }

    #[tracing::instrument(skip(self))]
    pub async fn open(
        &self,
        account_id: AggregateId,
        account_holder: &str,
        initial_balance: Money,
        currency: &str,
    ) -> Result<CommandResult<BankAccount>, DomainError> {
        self.commands
            .create(account_id, |a| a.open(account_holder, initial_balance, currency))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn deposit(
        &self,
        account_id: &AggregateId,
        amount: Money,
        description: &str,
    ) -> Result<CommandResult<BankAccount>, DomainError> {
        self.commands
            .execute(account_id, |a| a.deposit(amount, description))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn withdraw(
        &self,
        account_id: &AggregateId,
        amount: Money,
        description: &str,
    ) -> Result<CommandResult<BankAccount>, DomainError> {
        self.commands
            .execute(account_id, |a| a.withdraw(amount, description))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn transfer_out(
        &self,
        account_id: &AggregateId,
        amount: Money,
        target_account_id: &AggregateId,
        description: &str,
    ) -> Result<CommandResult<BankAccount>, DomainError> {
        self.commands
            .execute(account_id, |a| {
                a.transfer_out(amount, target_account_id.as_str(), description)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn receive_transfer(
        &self,
        account_id: &AggregateId,
        amount: Money,
        source_account_id: &AggregateId,
        description: &str,
    ) -> Result<CommandResult<BankAccount>, DomainError> {
        self.commands
            .execute(account_id, |a| {
                a.receive_transfer(amount, source_account_id.as_str(), description)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn accrue_interest(
        &self,
        account_id: &AggregateId,
        amount: Money,
    ) -> Result<CommandResult<BankAccount>, DomainError> {
        self.commands
            .execute(account_id, |a| a.accrue_interest(amount))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn close(
        &self,
        account_id: &AggregateId,
    ) -> Result<CommandResult<BankAccount>, DomainError> {
        self.commands.execute(account_id, |a| a.close()).await
    }

    /// Loads the current account state.
    pub async fn load(
        &self,
        account_id: &AggregateId,
    ) -> Result<AggregateRoot<BankAccount>, DomainError> {
        self.commands.load(account_id).await
    }

    pub async fn balance(&self, account_id: &AggregateId) -> Result<Money, DomainError> {
        Ok(self.load(account_id).await?.state().balance())
    }
}
