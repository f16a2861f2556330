//! Order dashboard read model: status, contents and a timeline per order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Aggregate, Money, Order, OrderEvent, OrderStatus, Projection};
use event_store::{EventEnvelope, Version};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTimelineEntry {
    pub status: OrderStatus,
    pub note: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub order_id: AggregateId,
    pub customer_id: String,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub item_count: u64,
    /// Distinct line categories, in line order.
    pub categories: Vec<String>,
    pub shipping_city: String,
    pub payment_id: Option<String>,
    pub tracking_number: Option<String>,
    pub cancellation_reason: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub timeline: Vec<OrderTimelineEntry>,
    pub projected_version: Version,
}

/// Read model view over the order stream.
#[derive(Clone, Default)]
pub struct OrderDashboardView {
    orders: Arc<RwLock<HashMap<AggregateId, OrderSummary>>>,
}

impl OrderDashboardView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, order_id: &AggregateId) -> Option<OrderSummary> {
        self.orders.read().await.get(order_id).cloned()
    }

    pub async fn by_status(&self, status: OrderStatus) -> Vec<OrderSummary> {
        let mut matching: Vec<OrderSummary> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.order_id.cmp(&b.order_id));
        matching
    }

    /// Orders of `customer_id` touched since `since` that share at least
    /// one of `categories`.
    pub async fn recent_orders(
        &self,
        customer_id: &str,
        categories: &[String],
        since: DateTime<Utc>,
    ) -> usize {
        self.orders
            .read()
            .await
            .values()
            .filter(|o| o.customer_id == customer_id && o.last_updated_at >= since)
            .filter(|o| o.categories.iter().any(|c| categories.contains(c)))
            .count()
    }

    pub async fn count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl Projection for OrderDashboardView {
    fn name(&self) -> &'static str {
        "OrderDashboardView"
    }

    async fn project(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != Order::aggregate_type() {
            return Ok(());
        }

        let order_event: OrderEvent = serde_json::from_value(event.payload.clone())?;
        let mut orders = self.orders.write().await;

        if let OrderEvent::OrderPlaced {
            customer_id,
            lines,
            shipping_address,
            total_amount,
        } = order_event
        {
            let mut categories: Vec<String> = Vec::new();
            for line in &lines {
                if !categories.contains(&line.category) {
                    categories.push(line.category.clone());
                }
            }
            orders
                .entry(event.aggregate_id.clone())
                .or_insert_with(|| OrderSummary {
                    order_id: event.aggregate_id.clone(),
                    customer_id,
                    status: OrderStatus::Placed,
                    total_amount,
                    item_count: lines.iter().map(|l| u64::from(l.quantity)).sum(),
                    categories,
                    shipping_city: shipping_address.city,
                    payment_id: None,
                    tracking_number: None,
                    cancellation_reason: None,
                    placed_at: event.occurred_at,
                    last_updated_at: event.occurred_at,
                    timeline: vec![OrderTimelineEntry {
                        status: OrderStatus::Placed,
                        note: format!("Order placed with {} line items", lines.len()),
                        at: event.occurred_at,
                    }],
                    projected_version: event.version,
                });
            return Ok(());
        }

        let Some(order) = orders.get_mut(&event.aggregate_id) else {
            tracing::warn!(
                order_id = %event.aggregate_id,
                event_type = %event.event_type,
                "event for unknown order"
            );
            return Ok(());
        };
        if event.version <= order.projected_version {
            return Ok(());
        }

        let (status, note) = match order_event {
            OrderEvent::OrderPlaced { .. } => return Ok(()),
            OrderEvent::InventoryReserved { product_ids } => (
                OrderStatus::InventoryReserved,
                format!("Inventory reserved for {} products", product_ids.len()),
            ),
            OrderEvent::PaymentProcessed { payment, amount } => {
                order.payment_id = Some(payment.payment_id);
                (
                    OrderStatus::PaymentProcessed,
                    format!("Payment processed: {amount}"),
                )
            }
            OrderEvent::OrderConfirmed => (OrderStatus::Confirmed, "Order confirmed".to_string()),
            OrderEvent::OrderShipped { tracking_number } => {
                let note = format!("Shipped with tracking: {tracking_number}");
                order.tracking_number = Some(tracking_number);
                (OrderStatus::Shipped, note)
            }
            OrderEvent::OrderCancelled { reason } => {
                let note = format!("Cancelled: {reason}");
                order.cancellation_reason = Some(reason);
                (OrderStatus::Cancelled, note)
            }
        };

        order.status = status;
        order.last_updated_at = event.occurred_at;
        order.projected_version = event.version;
        order.timeline.push(OrderTimelineEntry {
            status,
            note,
            at: event.occurred_at,
        });

        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.orders.write().await.clear();
        Ok(())
    }
}
