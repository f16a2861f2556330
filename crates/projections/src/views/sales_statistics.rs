//! Per-category sales statistics over the order stream.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Aggregate, Money, Order, OrderEvent, Projection};
use event_store::{EventEnvelope, Version};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalesStatistics {
    pub category: String,
    pub total_orders: u64,
    pub confirmed_count: u64,
    pub cancelled_count: u64,
    pub total_items_sold: u64,
    pub total_revenue: Money,
}

impl SalesStatistics {
    fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct State {
    categories: HashMap<String, SalesStatistics>,
    // Later order events do not carry the lines.
    orders: HashMap<AggregateId, (Vec<String>, Version)>,
}

#[derive(Clone, Default)]
pub struct SalesStatisticsView {
    state: Arc<RwLock<State>>,
}

impl SalesStatisticsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, category: &str) -> Option<SalesStatistics> {
        self.state.read().await.categories.get(category).cloned()
    }

    /// All categories, sorted by name.
    pub async fn all(&self) -> Vec<SalesStatistics> {
        let mut all: Vec<SalesStatistics> =
            self.state.read().await.categories.values().cloned().collect();
        all.sort_by(|a, b| a.category.cmp(&b.category));
        all
    }
}

#[async_trait]
impl Projection for SalesStatisticsView {
    fn name(&self) -> &'static str {
        "SalesStatisticsView"
    }

    async fn project(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != Order::aggregate_type() {
            return Ok(());
        }

        let order_event: OrderEvent = serde_json::from_value(event.payload.clone())?;
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if let OrderEvent::OrderPlaced { lines, .. } = &order_event {
            if state.orders.contains_key(&event.aggregate_id) {
                return Ok(());
            }

            let mut per_category: BTreeMap<&str, (u64, Money)> = BTreeMap::new();
            for line in lines {
                let entry = per_category
                    .entry(line.category.as_str())
                    .or_insert((0, Money::zero()));
                entry.0 += u64::from(line.quantity);
                if let Some(total) = line.line_total() {
                    entry.1 = entry.1.saturating_add(total);
                }
            }

            for (category, (items, revenue)) in &per_category {
                let stats = state
                    .categories
                    .entry(category.to_string())
                    .or_insert_with(|| SalesStatistics::new(category));
                stats.total_orders += 1;
                stats.total_items_sold += items;
                stats.total_revenue = stats.total_revenue.saturating_add(*revenue);
            }
            state.orders.insert(
                event.aggregate_id.clone(),
                (
                    per_category.keys().map(|c| c.to_string()).collect(),
                    event.version,
                ),
            );
            return Ok(());
        }

        let Some((categories, projected)) = state.orders.get_mut(&event.aggregate_id) else {
            tracing::warn!(order_id = %event.aggregate_id, "event for unknown order");
            return Ok(());
        };
        if event.version <= *projected {
            return Ok(());
        }
        *projected = event.version;

        for category in categories.iter() {
            let stats = state
                .categories
                .entry(category.clone())
                .or_insert_with(|| SalesStatistics::new(category));
            match &order_event {
                OrderEvent::OrderConfirmed => stats.confirmed_count += 1,
                OrderEvent::OrderCancelled { .. } => stats.cancelled_count += 1,
                OrderEvent::OrderPlaced { .. }
                | OrderEvent::InventoryReserved { .. }
                | OrderEvent::PaymentProcessed { .. }
                | OrderEvent::OrderShipped { .. } => {}
            }
        }

        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.categories.clear();
        state.orders.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Event, OrderLine, ShippingAddress};

    fn envelope(id: &str, version: i64, event: OrderEvent) -> EventEnvelope {
        Event::new(AggregateId::new(id), Version::new(version), event)
            .to_envelope("Order")
            .unwrap()
    }

    fn placed(lines: Vec<OrderLine>) -> OrderEvent {
        OrderEvent::OrderPlaced {
            customer_id: "CUST-1".to_string(),
            total_amount: lines.iter().filter_map(OrderLine::line_total).sum(),
            lines,
            shipping_address: ShippingAddress::default(),
        }
    }

    #[tokio::test]
    async fn placement_splits_items_and_revenue_by_category() {
        let view = SalesStatisticsView::new();
        view.project(&envelope(
            "ORD-1",
            1,
            placed(vec![
                OrderLine::new("SKU-1", "Kettle", "KITCHEN", 2, Money::from_cents(2_500)),
                OrderLine::new("SKU-2", "Pan", "KITCHEN", 1, Money::from_cents(3_000)),
                OrderLine::new("SKU-3", "Lamp", "HOME", 4, Money::from_cents(1_000)),
            ]),
        ))
        .await
        .unwrap();
        view.project(&envelope(
            "ORD-2",
            1,
            placed(vec![OrderLine::new(
                "SKU-1",
                "Kettle",
                "KITCHEN",
                1,
                Money::from_cents(2_500),
            )]),
        ))
        .await
        .unwrap();

        let kitchen = view.get("KITCHEN").await.unwrap();
        assert_eq!(kitchen.total_orders, 2);
        assert_eq!(kitchen.total_items_sold, 4);
        assert_eq!(kitchen.total_revenue, Money::from_cents(10_500));

        let home = view.get("HOME").await.unwrap();
        assert_eq!(home.total_orders, 1);
        assert_eq!(home.total_items_sold, 4);
        assert_eq!(home.total_revenue, Money::from_cents(4_000));

        let names: Vec<String> = view.all().await.into_iter().map(|s| s.category).collect();
        assert_eq!(names, vec!["HOME", "KITCHEN"]);
    }

    #[tokio::test]
    async fn outcomes_count_for_every_category_of_the_order() {
        let view = SalesStatisticsView::new();
        view.project(&envelope(
            "ORD-1",
            1,
            placed(vec![
                OrderLine::new("SKU-1", "Kettle", "KITCHEN", 1, Money::from_cents(2_500)),
                OrderLine::new("SKU-3", "Lamp", "HOME", 1, Money::from_cents(1_000)),
            ]),
        ))
        .await
        .unwrap();
        view.project(&envelope(
            "ORD-2",
            1,
            placed(vec![OrderLine::new(
                "SKU-3",
                "Lamp",
                "HOME",
                1,
                Money::from_cents(1_000),
            )]),
        ))
        .await
        .unwrap();

        let confirmed = envelope("ORD-1", 2, OrderEvent::OrderConfirmed);
        view.project(&confirmed).await.unwrap();
        view.project(&confirmed).await.unwrap();
        view.project(&envelope(
            "ORD-2",
            2,
            OrderEvent::OrderCancelled {
                reason: "out of stock".to_string(),
            },
        ))
        .await
        .unwrap();

        let kitchen = view.get("KITCHEN").await.unwrap();
        assert_eq!(kitchen.confirmed_count, 1);
        assert_eq!(kitchen.cancelled_count, 0);

        let home = view.get("HOME").await.unwrap();
        assert_eq!(home.confirmed_count, 1);
        assert_eq!(home.cancelled_count, 1);
    }
}
