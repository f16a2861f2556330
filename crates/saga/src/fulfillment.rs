//! Order fulfillment saga: stock check, reservation, payment, confirmation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::AggregateId;
use domain::{Money, OrderLine, OrderService, PaymentInfo};
use event_store::{EventStore, SnapshotStore};
use projections::OrderDashboardView;

use crate::context::SagaContext;
use crate::error::{Result, SagaError};
use crate::log::SagaLog;
use crate::orchestrator::SagaOrchestrator;
use crate::services::inventory::requested_units;
use crate::services::{InventoryService, PaymentService};
use crate::step::SagaStep;

pub const ORDER_FULFILLMENT: &str = "ORDER_FULFILLMENT";

pub const VALIDATE_STOCK: &str = "VALIDATE_STOCK";
pub const RESERVE_INVENTORY: &str = "RESERVE_INVENTORY";
pub const PROCESS_PAYMENT: &str = "PROCESS_PAYMENT";
pub const CONFIRM_ORDER: &str = "CONFIRM_ORDER";

const ORDER_KEY: &str = "orderId";
const CUSTOMER_KEY: &str = "customerId";
const LINES_KEY: &str = "lines";
const TOTAL_KEY: &str = "totalAmount";

/// Context key under which the payment step stores the payment id.
pub const PAYMENT_ID_KEY: &str = "paymentId";

/// Largest order total the payment step will charge.
pub const PAYMENT_LIMIT: Money = Money::from_cents(100_000_000);

/// A customer with more recent orders than this in one of the order's
/// categories is refused.
pub const BULK_ORDER_LIMIT: usize = 3;

/// Window, in hours, over which recent orders are counted.
pub const BULK_ORDER_WINDOW_HOURS: i64 = 24;

const PAYMENT_METHOD: &str = "CREDIT_CARD";
const CARD_LAST_FOUR: &str = "1234";

fn order_id(context: &SagaContext) -> Result<AggregateId> {
    Ok(AggregateId::new(context.require::<String>(ORDER_KEY)?))
}

/// Checks stock and the bulk purchase limit. Read-only, so nothing to
/// compensate.
pub struct ValidateStock {
    inventory: Arc<dyn InventoryService>,
    dashboard: OrderDashboardView,
}

#[async_trait]
impl SagaStep for ValidateStock {
    fn name(&self) -> &str {
        VALIDATE_STOCK
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<()> {
        let customer_id: String = context.require(CUSTOMER_KEY)?;
        let lines: Vec<OrderLine> = context.require(LINES_KEY)?;

        for (product_id, requested) in requested_units(&lines) {
            let product = self
                .inventory
                .product(product_id)
                .await
                .ok_or_else(|| SagaError::Step(format!("Product not found: {product_id}")))?;
            if product.stock < requested {
                return Err(SagaError::Step(format!(
                    "Insufficient stock for product: {product_id} (available: {}, requested: {requested})",
                    product.stock
                )));
            }
        }

        let mut categories: Vec<String> = lines.iter().map(|l| l.category.clone()).collect();
        categories.sort();
        categories.dedup();
        let since = Utc::now() - Duration::hours(BULK_ORDER_WINDOW_HOURS);
        let recent = self
            .dashboard
            .recent_orders(&customer_id, &categories, since)
            .await;
        if recent > BULK_ORDER_LIMIT {
            return Err(SagaError::Step(format!(
                "Bulk purchase limit exceeded: {recent} orders in last \
                 {BULK_ORDER_WINDOW_HOURS} hours for same category"
            )));
        }

        Ok(())
    }

    async fn compensate(&self, _context: &SagaContext) -> Result<()> {
        Ok(())
    }
}

/// Takes the stock and marks the order reserved.
pub struct ReserveInventory<S: EventStore + SnapshotStore> {
    orders: Arc<OrderService<S>>,
    inventory: Arc<dyn InventoryService>,
}

#[async_trait]
impl<S: EventStore + SnapshotStore + 'static> SagaStep for ReserveInventory<S> {
    fn name(&self) -> &str {
        RESERVE_INVENTORY
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<()> {
        let order_id = order_id(context)?;
        let lines: Vec<OrderLine> = context.require(LINES_KEY)?;

        self.inventory.reserve(&order_id, &lines).await?;
        if let Err(e) = self.orders.reserve_inventory(&order_id).await {
            self.inventory.release(&order_id).await?;
            return Err(e.into());
        }
        Ok(())
    }

    async fn compensate(&self, context: &SagaContext) -> Result<()> {
        let order_id = order_id(context)?;
        self.inventory.release(&order_id).await?;

        // A later compensation may already have cancelled the order.
        let order = self.orders.load(&order_id).await?;
        if order.state().status().can_cancel() {
            self.orders
                .cancel(&order_id, "Inventory compensation: saga rollback")
                .await?;
        }
        Ok(())
    }
}

/// Charges the customer and records the payment on the order. The payment
/// id is written to the context for later steps and compensation.
pub struct ProcessPayment<S: EventStore + SnapshotStore> {
    orders: Arc<OrderService<S>>,
    payments: Arc<dyn PaymentService>,
}

#[async_trait]
impl<S: EventStore + SnapshotStore + 'static> SagaStep for ProcessPayment<S> {
    fn name(&self) -> &str {
        PROCESS_PAYMENT
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<()> {
        let order_id = order_id(context)?;
        let customer_id: String = context.require(CUSTOMER_KEY)?;
        let total: Money = context.require(TOTAL_KEY)?;

        if total > PAYMENT_LIMIT {
            return Err(SagaError::Step(format!(
                "Payment declined: amount {total} exceeds limit {PAYMENT_LIMIT}"
            )));
        }

        let payment = self.payments.charge(&order_id, &customer_id, total).await?;
        context.put(PAYMENT_ID_KEY, &payment.payment_id)?;

        let info = PaymentInfo {
            payment_id: payment.payment_id.clone(),
            method: PAYMENT_METHOD.to_string(),
            last_four: CARD_LAST_FOUR.to_string(),
        };
        if let Err(e) = self.orders.process_payment(&order_id, info, total).await {
            self.payments.refund(&payment.payment_id).await?;
            return Err(e.into());
        }
        Ok(())
    }

    async fn compensate(&self, context: &SagaContext) -> Result<()> {
        let order_id = order_id(context)?;
        if let Some(payment_id) = context.get::<String>(PAYMENT_ID_KEY)? {
            self.payments.refund(&payment_id).await?;
        }

        let order = self.orders.load(&order_id).await?;
        if order.state().status().can_cancel() {
            self.orders
                .cancel(&order_id, "Payment compensation: saga rollback")
                .await?;
        }
        Ok(())
    }
}

/// Confirms the paid order.
pub struct ConfirmOrder<S: EventStore + SnapshotStore> {
    orders: Arc<OrderService<S>>,
}

#[async_trait]
impl<S: EventStore + SnapshotStore + 'static> SagaStep for ConfirmOrder<S> {
    fn name(&self) -> &str {
        CONFIRM_ORDER
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<()> {
        let order_id = order_id(context)?;
        self.orders.confirm(&order_id).await?;
        Ok(())
    }

    // Last step: it never needs to be undone by a later failure.
    async fn compensate(&self, _context: &SagaContext) -> Result<()> {
        Ok(())
    }
}

/// Runs `VALIDATE_STOCK, RESERVE_INVENTORY, PROCESS_PAYMENT, CONFIRM_ORDER`.
pub struct FulfillmentSaga<S: EventStore + SnapshotStore> {
    orchestrator: SagaOrchestrator,
    orders: Arc<OrderService<S>>,
    inventory: Arc<dyn InventoryService>,
    payments: Arc<dyn PaymentService>,
    dashboard: OrderDashboardView,
}

impl<S: EventStore + SnapshotStore + 'static> FulfillmentSaga<S> {
    pub fn new(
        orchestrator: SagaOrchestrator,
        orders: Arc<OrderService<S>>,
        inventory: Arc<dyn InventoryService>,
        payments: Arc<dyn PaymentService>,
        dashboard: OrderDashboardView,
    ) -> Self {
        Self {
            orchestrator,
            orders,
            inventory,
            payments,
            dashboard,
        }
    }

    fn steps(&self) -> Vec<Box<dyn SagaStep>> {
        vec![
            Box::new(ValidateStock {
                inventory: self.inventory.clone(),
                dashboard: self.dashboard.clone(),
            }),
            Box::new(ReserveInventory {
                orders: self.orders.clone(),
                inventory: self.inventory.clone(),
            }),
            Box::new(ProcessPayment {
                orders: self.orders.clone(),
                payments: self.payments.clone(),
            }),
            Box::new(ConfirmOrder {
                orders: self.orders.clone(),
            }),
        ]
    }

    /// Fulfills a placed order. Fails before any step runs if the order
    /// does not exist.
    #[tracing::instrument(skip(self), fields(%order_id))]
    pub async fn fulfill(&self, order_id: &AggregateId) -> Result<SagaLog> {
        let order = self.orders.load(order_id).await?;
        let order = order.state();

        let context = SagaContext::new()
            .with(ORDER_KEY, order_id.as_str())?
            .with(CUSTOMER_KEY, order.customer_id())?
            .with(LINES_KEY, order.lines())?
            .with(TOTAL_KEY, order.total_amount())?;

        self.orchestrator
            .execute(ORDER_FULFILLMENT, &self.steps(), context)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemorySagaLogRepository;
    use crate::services::{InMemoryInventoryService, InMemoryPaymentService, Product};
    use crate::state::{SagaStatus, StepStatus};
    use domain::{CommandService, DomainError, OrderStatus, ShippingAddress};
    use event_store::InMemoryEventStore;

    struct Fixture {
        saga: FulfillmentSaga<InMemoryEventStore>,
        orders: Arc<OrderService<InMemoryEventStore>>,
        inventory: InMemoryInventoryService,
        payments: InMemoryPaymentService,
    }

    async fn fixture() -> Fixture {
        let dashboard = OrderDashboardView::new();
        let orders = Arc::new(OrderService::new(
            CommandService::new(InMemoryEventStore::new())
                .with_projection(Arc::new(dashboard.clone())),
        ));
        let inventory = InMemoryInventoryService::new();
        inventory
            .add_product(Product {
                product_id: "SKU-1".to_string(),
                name: "Kettle".to_string(),
                category: "KITCHEN".to_string(),
                unit_price: Money::from_cents(2_500),
                stock: 10,
            })
            .await;
        let payments = InMemoryPaymentService::new();
        let saga = FulfillmentSaga::new(
            SagaOrchestrator::new(Arc::new(InMemorySagaLogRepository::new())),
            orders.clone(),
            Arc::new(inventory.clone()),
            Arc::new(payments.clone()),
            dashboard,
        );
        Fixture {
            saga,
            orders,
            inventory,
            payments,
        }
    }

    async fn place(fixture: &Fixture, id: &str, quantity: u32, unit_cents: i64) -> AggregateId {
        let order_id = AggregateId::new(id);
        fixture
            .orders
            .place(
                order_id.clone(),
                "CUST-1",
                vec![OrderLine::new(
                    "SKU-1",
                    "Kettle",
                    "KITCHEN",
                    quantity,
                    Money::from_cents(unit_cents),
                )],
                ShippingAddress::default(),
            )
            .await
            .unwrap();
        order_id
    }

    async fn status(fixture: &Fixture, id: &AggregateId) -> OrderStatus {
        fixture.orders.load(id).await.unwrap().state().status()
    }

    #[tokio::test]
    async fn fulfilled_order_is_confirmed_and_paid() {
        let f = fixture().await;
        let id = place(&f, "ORD-1", 3, 2_500).await;

        let log = f.saga.fulfill(&id).await.unwrap();

        assert_eq!(log.status, SagaStatus::Completed);
        assert_eq!(log.steps.len(), 4);
        assert_eq!(status(&f, &id).await, OrderStatus::Confirmed);
        assert_eq!(f.inventory.stock("SKU-1").await, Some(7));
        assert_eq!(
            log.context.get::<String>(PAYMENT_ID_KEY).unwrap().as_deref(),
            Some("PAY-0001")
        );
        let order = f.orders.load(&id).await.unwrap();
        assert_eq!(
            order.state().payment().map(|p| p.payment_id.as_str()),
            Some("PAY-0001")
        );
    }

    #[tokio::test]
    async fn insufficient_stock_fails_before_reserving() {
        let f = fixture().await;
        let id = place(&f, "ORD-1", 11, 2_500).await;

        let log = f.saga.fulfill(&id).await.unwrap();

        assert_eq!(log.status, SagaStatus::Compensated);
        assert_eq!(log.steps[0].status, StepStatus::Failed);
        assert_eq!(
            log.failure_reason.as_deref(),
            Some("Insufficient stock for product: SKU-1 (available: 10, requested: 11)")
        );
        assert_eq!(status(&f, &id).await, OrderStatus::Placed);
        assert_eq!(f.inventory.stock("SKU-1").await, Some(10));
    }

    #[tokio::test]
    async fn declined_payment_releases_stock_and_cancels() {
        let f = fixture().await;
        let id = place(&f, "ORD-1", 4, 2_500).await;
        f.payments.set_fail_on_charge(true).await;

        let log = f.saga.fulfill(&id).await.unwrap();

        assert_eq!(log.status, SagaStatus::Compensated);
        assert_eq!(
            log.step_statuses(),
            vec![
                StepStatus::Compensated,
                StepStatus::Compensated,
                StepStatus::Failed,
                StepStatus::Pending
            ]
        );
        assert_eq!(f.inventory.stock("SKU-1").await, Some(10));
        let order = f.orders.load(&id).await.unwrap();
        assert_eq!(order.state().status(), OrderStatus::Cancelled);
        assert_eq!(
            order.state().cancellation_reason(),
            Some("Inventory compensation: saga rollback")
        );
    }

    #[tokio::test]
    async fn total_over_the_limit_is_declined() {
        let f = fixture().await;
        let id = place(&f, "ORD-1", 2, 60_000_000).await;

        let log = f.saga.fulfill(&id).await.unwrap();

        assert_eq!(log.status, SagaStatus::Compensated);
        assert_eq!(
            log.failure_reason.as_deref(),
            Some("Payment declined: amount 1200000.00 exceeds limit 1000000.00")
        );
        assert_eq!(f.payments.payment_count().await, 0);
        assert_eq!(status(&f, &id).await, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn payment_compensation_refunds_and_cancels() {
        let f = fixture().await;
        let id = place(&f, "ORD-1", 1, 2_500).await;
        f.orders.reserve_inventory(&id).await.unwrap();

        let step = ProcessPayment {
            orders: f.orders.clone(),
            payments: Arc::new(f.payments.clone()),
        };
        let mut context = SagaContext::new()
            .with(ORDER_KEY, "ORD-1")
            .unwrap()
            .with(CUSTOMER_KEY, "CUST-1")
            .unwrap()
            .with(TOTAL_KEY, Money::from_cents(2_500))
            .unwrap();

        step.execute(&mut context).await.unwrap();
        assert_eq!(status(&f, &id).await, OrderStatus::PaymentProcessed);
        let payment_id: String = context.require(PAYMENT_ID_KEY).unwrap();

        step.compensate(&context).await.unwrap();
        assert_eq!(f.payments.refunded().await, vec![payment_id]);
        let order = f.orders.load(&id).await.unwrap();
        assert_eq!(order.state().status(), OrderStatus::Cancelled);
        assert_eq!(
            order.state().cancellation_reason(),
            Some("Payment compensation: saga rollback")
        );
    }

    #[tokio::test]
    async fn fourth_recent_order_in_a_category_hits_the_bulk_limit() {
        let f = fixture().await;
        for i in 1..=3 {
            place(&f, &format!("ORD-{i}"), 1, 2_500).await;
        }
        let id = place(&f, "ORD-4", 1, 2_500).await;

        let log = f.saga.fulfill(&id).await.unwrap();

        assert_eq!(log.status, SagaStatus::Compensated);
        assert_eq!(
            log.failure_reason.as_deref(),
            Some("Bulk purchase limit exceeded: 4 orders in last 24 hours for same category")
        );
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let f = fixture().await;
        let err = f.saga.fulfill(&AggregateId::new("ORD-404")).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::Domain(DomainError::NotFound { .. })
        ));
    }
}
