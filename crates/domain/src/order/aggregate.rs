//! Order aggregate implementation.

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{
    ORDER_STREAM, OrderError, OrderEvent, OrderLine, OrderStatus, PaymentInfo, ShippingAddress,
};

/// Customer order, from placement to shipping or cancellation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    placed: bool,
    customer_id: String,
    lines: Vec<OrderLine>,
    shipping_address: ShippingAddress,
    total_amount: Money,
    payment: Option<PaymentInfo>,
    tracking_number: Option<String>,
    cancellation_reason: Option<String>,
    status: OrderStatus,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn stream() -> &'static str {
        ORDER_STREAM
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced {
                customer_id,
                lines,
                shipping_address,
                total_amount,
            } => {
                self.placed = true;
                self.customer_id = customer_id.clone();
                self.lines = lines.clone();
                self.shipping_address = shipping_address.clone();
                self.total_amount = *total_amount;
                self.status = OrderStatus::Placed;
            }
            OrderEvent::InventoryReserved { .. } => {
                self.status = OrderStatus::InventoryReserved;
            }
            OrderEvent::PaymentProcessed { payment, .. } => {
                self.payment = Some(payment.clone());
                self.status = OrderStatus::PaymentProcessed;
            }
            OrderEvent::OrderConfirmed => {
                self.status = OrderStatus::Confirmed;
            }
            OrderEvent::OrderShipped { tracking_number } => {
                self.tracking_number = Some(tracking_number.clone());
                self.status = OrderStatus::Shipped;
            }
            OrderEvent::OrderCancelled { reason } => {
                self.cancellation_reason = Some(reason.clone());
                self.status = OrderStatus::Cancelled;
            }
        }
    }
}

// Query methods
impl Order {
    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn payment(&self) -> Option<&PaymentInfo> {
        self.payment.as_ref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }
}

// Command methods (return events)
impl Order {
    /// Places a new order. Factory command; the total is the sum of the
    /// line totals.
    pub fn place(
        &self,
        customer_id: impl Into<String>,
        lines: Vec<OrderLine>,
        shipping_address: ShippingAddress,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.placed {
            return Err(OrderError::AlreadyPlaced);
        }
        if lines.is_empty() {
            return Err(OrderError::NoLines);
        }

        let mut total_amount = Money::zero();
        for line in &lines {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: line.product_id.clone(),
                });
            }
            if !line.unit_price.is_positive() {
                return Err(OrderError::NonPositivePrice {
                    product_id: line.product_id.clone(),
                });
            }
            total_amount = line
                .line_total()
                .and_then(|t| total_amount.checked_add(t))
                .ok_or(OrderError::TotalOverflow)?;
        }

        Ok(vec![OrderEvent::OrderPlaced {
            customer_id: customer_id.into(),
            lines,
            shipping_address,
            total_amount,
        }])
    }

    pub fn reserve_inventory(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure(self.status.can_reserve_inventory(), "reserve inventory for")?;

        Ok(vec![OrderEvent::InventoryReserved {
            product_ids: self.lines.iter().map(|l| l.product_id.clone()).collect(),
        }])
    }

    pub fn process_payment(
        &self,
        payment: PaymentInfo,
        amount: Money,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure(self.status.can_process_payment(), "process payment for")?;
        if amount != self.total_amount {
            return Err(OrderError::PaymentMismatch {
                paid: amount,
                total: self.total_amount,
            });
        }

        Ok(vec![OrderEvent::PaymentProcessed { payment, amount }])
    }

    pub fn confirm(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure(self.status.can_confirm(), "confirm")?;
        Ok(vec![OrderEvent::OrderConfirmed])
    }

    pub fn ship(&self, tracking_number: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure(self.status.can_ship(), "ship")?;
        let tracking_number = tracking_number.into();
        if tracking_number.trim().is_empty() {
            return Err(OrderError::MissingTrackingNumber);
        }

        Ok(vec![OrderEvent::OrderShipped { tracking_number }])
    }

    pub fn cancel(&self, reason: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure(self.status.can_cancel(), "cancel")?;

        Ok(vec![OrderEvent::OrderCancelled {
            reason: reason.into(),
        }])
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), OrderError> {
        if !self.placed {
            return Err(OrderError::NotPlaced);
        }
        if !allowed {
            return Err(OrderError::InvalidTransition {
                action,
                current: self.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AggregateRoot;
    use common::AggregateId;
    use event_store::Version;

    fn lines() -> Vec<OrderLine> {
        vec![
            OrderLine::new("SKU-1", "Kettle", "KITCHEN", 2, Money::from_cents(2_500)),
            OrderLine::new("SKU-2", "Toaster", "KITCHEN", 1, Money::from_cents(4_000)),
        ]
    }

    fn card(payment_id: &str) -> PaymentInfo {
        PaymentInfo {
            payment_id: payment_id.to_string(),
            method: "CREDIT_CARD".to_string(),
            last_four: "1234".to_string(),
        }
    }

    fn placed() -> AggregateRoot<Order> {
        let mut root: AggregateRoot<Order> = AggregateRoot::new(AggregateId::new("ORD-1"));
        root.execute(|o| o.place("CUST-1", lines(), ShippingAddress::default()))
            .unwrap();
        root
    }

    #[test]
    fn total_is_the_sum_of_line_totals() {
        let root = placed();
        assert_eq!(root.state().total_amount(), Money::from_cents(9_000));
        assert_eq!(root.state().item_count(), 3);
        assert_eq!(root.state().status(), OrderStatus::Placed);
    }

    #[test]
    fn full_lifecycle_to_shipped() {
        let mut root = placed();
        root.execute(|o| o.reserve_inventory()).unwrap();
        root.execute(|o| o.process_payment(card("PAY-1"), Money::from_cents(9_000)))
            .unwrap();
        root.execute(|o| o.confirm()).unwrap();
        root.execute(|o| o.ship("TRK-1")).unwrap();

        let order = root.state();
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert_eq!(order.payment().map(|p| p.payment_id.as_str()), Some("PAY-1"));
        assert_eq!(order.tracking_number(), Some("TRK-1"));
        assert_eq!(root.version(), Version::new(5));
    }

    #[test]
    fn place_validates_lines() {
        let order = Order::default();
        assert!(matches!(
            order.place("CUST-1", vec![], ShippingAddress::default()),
            Err(OrderError::NoLines)
        ));
        assert!(matches!(
            order.place(
                "CUST-1",
                vec![OrderLine::new("SKU-1", "Kettle", "KITCHEN", 0, Money::from_cents(1))],
                ShippingAddress::default()
            ),
            Err(OrderError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            order.place(
                "CUST-1",
                vec![OrderLine::new("SKU-1", "Kettle", "KITCHEN", 1, Money::zero())],
                ShippingAddress::default()
            ),
            Err(OrderError::NonPositivePrice { .. })
        ));
        assert!(matches!(
            order.place(
                "CUST-1",
                vec![
                    OrderLine::new("SKU-1", "Yacht", "MARINE", 1, Money::from_cents(i64::MAX)),
                    OrderLine::new("SKU-2", "Oar", "MARINE", 1, Money::from_cents(1)),
                ],
                ShippingAddress::default()
            ),
            Err(OrderError::TotalOverflow)
        ));
    }

    #[test]
    fn payment_must_match_total() {
        let mut root = placed();
        root.execute(|o| o.reserve_inventory()).unwrap();

        let err = root
            .execute(|o| o.process_payment(card("PAY-1"), Money::from_cents(8_999)))
            .unwrap_err();
        assert!(matches!(err, OrderError::PaymentMismatch { .. }));
        assert_eq!(root.state().status(), OrderStatus::InventoryReserved);
    }

    #[test]
    fn transitions_out_of_order_are_rejected() {
        let root = placed();
        let order = root.state();

        assert!(matches!(
            order.confirm(),
            Err(OrderError::InvalidTransition {
                action: "confirm",
                current: OrderStatus::Placed
            })
        ));
        assert!(order.ship("TRK-1").is_err());
        assert!(
            order
                .process_payment(card("PAY-1"), Money::from_cents(9_000))
                .is_err()
        );
    }

    #[test]
    fn paid_order_can_still_be_cancelled() {
        let mut root = placed();
        root.execute(|o| o.reserve_inventory()).unwrap();
        root.execute(|o| o.process_payment(card("PAY-1"), Money::from_cents(9_000)))
            .unwrap();
        root.execute(|o| o.cancel("rollback")).unwrap();

        assert_eq!(root.state().status(), OrderStatus::Cancelled);
        assert_eq!(root.state().cancellation_reason(), Some("rollback"));
        assert!(root.execute(|o| o.cancel("again")).is_err());
    }

    #[test]
    fn confirmed_order_cannot_be_cancelled() {
        let mut root = placed();
        root.execute(|o| o.reserve_inventory()).unwrap();
        root.execute(|o| o.process_payment(card("PAY-1"), Money::from_cents(9_000)))
            .unwrap();
        root.execute(|o| o.confirm()).unwrap();

        assert!(root.execute(|o| o.cancel("too late")).is_err());
        assert!(matches!(
            root.state().ship("  "),
            Err(OrderError::MissingTrackingNumber)
        ));
    }

    #[test]
    fn commands_on_unplaced_order_fail() {
        let order = Order::default();
        assert!(matches!(order.cancel("x"), Err(OrderError::NotPlaced)));
    }
}
