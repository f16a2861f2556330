//! Order service providing one method per order command.

use common::AggregateId;
use event_store::{EventStore, SnapshotStore};

use crate::command::{CommandResult, CommandService};
use crate::error::DomainError;
use crate::money::Money;
use crate::root::AggregateRoot;

use super::{Order, OrderLine, PaymentInfo, ShippingAddress};

/// Service for managing customer orders.
pub struct OrderService<S: EventStore + SnapshotStore> {
    commands: CommandService<S, Order>,
}

impl<S: EventStore + SnapshotStore> OrderService<S> {
    pub fn new(commands: CommandService<S, Order>) -> Self {
        Self { commands }
    }

    /// Returns a reference to the underlying command service.
    pub fn commands(&self) -> &CommandService<S, Order> {
        &self.commands
    }

    #[tracing::instrument(skip(self, lines, shipping_address))]
    pub async fn place(
        &self,
        order_id: AggregateId,
        customer_id: &str,
        lines: Vec<OrderLine>,
        shipping_address: ShippingAddress,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.commands
            .create(order_id, |o| o.place(customer_id, lines, shipping_address))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reserve_inventory(
        &self,
        order_id: &AggregateId,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.commands
            .execute(order_id, |o| o.reserve_inventory())
            .await
    }

    #[tracing::instrument(skip(self, payment), fields(payment_id = %payment.payment_id))]
    pub async fn process_payment(
        &self,
        order_id: &AggregateId,
        payment: PaymentInfo,
        amount: Money,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.commands
            .execute(order_id, |o| o.process_payment(payment, amount))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn confirm(
        &self,
        order_id: &AggregateId,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.commands.execute(order_id, |o| o.confirm()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn ship(
        &self,
        order_id: &AggregateId,
        tracking_number: &str,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.commands
            .execute(order_id, |o| o.ship(tracking_number))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        order_id: &AggregateId,
        reason: &str,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.commands.execute(order_id, |o| o.cancel(reason)).await
    }

    pub async fn load(&self, order_id: &AggregateId) -> Result<AggregateRoot<Order>, DomainError> {
        self.commands.load(order_id).await
    }
}
