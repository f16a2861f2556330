//! Order domain events.

use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

use super::{OrderLine, PaymentInfo, ShippingAddress};

/// Events that can occur on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderPlaced {
        customer_id: String,
        lines: Vec<OrderLine>,
        shipping_address: ShippingAddress,
        total_amount: Money,
    },

    InventoryReserved {
        product_ids: Vec<String>,
    },

    PaymentProcessed {
        payment: PaymentInfo,
        amount: Money,
    },

    OrderConfirmed,

    OrderShipped {
        tracking_number: String,
    },

    OrderCancelled {
        reason: String,
    },
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced { .. } => "OrderPlaced",
            OrderEvent::InventoryReserved { .. } => "InventoryReserved",
            OrderEvent::PaymentProcessed { .. } => "PaymentProcessed",
            OrderEvent::OrderConfirmed => "OrderConfirmed",
            OrderEvent::OrderShipped { .. } => "OrderShipped",
            OrderEvent::OrderCancelled { .. } => "OrderCancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use common::AggregateId;
    use event_store::Version;

    #[test]
    fn every_variant_survives_the_envelope() {
        let variants = vec![
            OrderEvent::OrderPlaced {
                customer_id: "CUST-1".to_string(),
                lines: vec![OrderLine::new(
                    "SKU-1",
                    "Kettle",
                    "KITCHEN",
                    2,
                    Money::from_cents(2_500),
                )],
                shipping_address: ShippingAddress {
                    street: "1 Main St".to_string(),
                    city: "Lisbon".to_string(),
                    postal_code: "1000-001".to_string(),
                    country: "PT".to_string(),
                },
                total_amount: Money::from_cents(5_000),
            },
            OrderEvent::InventoryReserved {
                product_ids: vec!["SKU-1".to_string()],
            },
            OrderEvent::PaymentProcessed {
                payment: PaymentInfo {
                    payment_id: "PAY-1".to_string(),
                    method: "CREDIT_CARD".to_string(),
                    last_four: "1234".to_string(),
                },
                amount: Money::from_cents(5_000),
            },
            OrderEvent::OrderConfirmed,
            OrderEvent::OrderShipped {
                tracking_number: "TRK-1".to_string(),
            },
            OrderEvent::OrderCancelled {
                reason: "changed mind".to_string(),
            },
        ];

        for (i, payload) in variants.into_iter().enumerate() {
            let event = Event::new(
                AggregateId::new("ORD-1"),
                Version::new(i as i64 + 1),
                payload.clone(),
            );
            let envelope = event.to_envelope("Order").unwrap();
            assert_eq!(envelope.event_type, payload.event_type());

            let decoded = Event::<OrderEvent>::from_envelope(&envelope).unwrap();
            assert_eq!(decoded.payload, payload);
        }
    }
}
