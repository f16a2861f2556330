//! Transfer notification read model, driven by the change-feed listener.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AccountEvent, Aggregate, BankAccount, Money, Projection};
use event_store::{EventEnvelope, EventId};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferDirection {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferNotification {
    pub event_id: EventId,
    pub account_id: AggregateId,
    pub counterparty: String,
    pub direction: TransferDirection,
    pub amount: Money,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Notifications for both legs of every transfer, in delivery order.
#[derive(Clone, Default)]
pub struct TransferNotificationView {
    notifications: Arc<RwLock<Vec<TransferNotification>>>,
}

impl TransferNotificationView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn for_account(&self, account_id: &AggregateId) -> Vec<TransferNotification> {
        self.notifications
            .read()
            .await
            .iter()
            .filter(|n| &n.account_id == account_id)
            .cloned()
            .collect()
    }

    pub async fn all(&self) -> Vec<TransferNotification> {
        self.notifications.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.notifications.read().await.len()
    }
}

#[async_trait]
impl Projection for TransferNotificationView {
    fn name(&self) -> &'static str {
        "TransferNotificationView"
    }

    async fn project(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != BankAccount::aggregate_type() {
            return Ok(());
        }

        let (direction, amount, counterparty) =
            match serde_json::from_value::<AccountEvent>(event.payload.clone())? {
                AccountEvent::FundsTransferredOut {
                    amount,
                    target_account_id,
                    ..
                } => (TransferDirection::Outgoing, amount, target_account_id),
                AccountEvent::FundsTransferredIn {
                    amount,
                    source_account_id,
                    ..
                } => (TransferDirection::Incoming, amount, source_account_id),
                AccountEvent::AccountOpened { .. }
                | AccountEvent::FundsDeposited { .. }
                | AccountEvent::FundsWithdrawn { .. }
                | AccountEvent::InterestAccrued { .. }
                | AccountEvent::AccountClosed => return Ok(()),
            };

        let message = match direction {
            TransferDirection::Outgoing => format!("Sent {amount} to {counterparty}"),
            TransferDirection::Incoming => format!("Received {amount} from {counterparty}"),
        };
        tracing::debug!(account_id = %event.aggregate_id, %message, "transfer notification");

        self.notifications.write().await.push(TransferNotification {
            event_id: event.event_id,
            account_id: event.aggregate_id.clone(),
            counterparty,
            direction,
            amount,
            message,
            occurred_at: event.occurred_at,
        });

        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.notifications.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Event;
    use event_store::Version;

    fn envelope(id: &str, version: i64, event: AccountEvent) -> EventEnvelope {
        Event::new(AggregateId::new(id), Version::new(version), event)
            .to_envelope("BankAccount")
            .unwrap()
    }

    #[tokio::test]
    async fn records_both_legs() {
        let view = TransferNotificationView::new();
        view.project(&envelope(
            "ACC-1",
            2,
            AccountEvent::FundsTransferredOut {
                amount: Money::from_cents(2_000),
                target_account_id: "ACC-2".to_string(),
                description: "rent".to_string(),
            },
        ))
        .await
        .unwrap();
        view.project(&envelope(
            "ACC-2",
            2,
            AccountEvent::FundsTransferredIn {
                amount: Money::from_cents(2_000),
                source_account_id: "ACC-1".to_string(),
                description: "rent".to_string(),
            },
        ))
        .await
        .unwrap();

        let sent = view.for_account(&AggregateId::new("ACC-1")).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].direction, TransferDirection::Outgoing);
        assert_eq!(sent[0].message, "Sent 20.00 to ACC-2");

        let received = view.for_account(&AggregateId::new("ACC-2")).await;
        assert_eq!(received[0].message, "Received 20.00 from ACC-1");
    }

    #[tokio::test]
    async fn other_account_events_are_ignored() {
        let view = TransferNotificationView::new();
        view.project(&envelope(
            "ACC-1",
            2,
            AccountEvent::FundsDeposited {
                amount: Money::from_cents(1),
                description: "x".to_string(),
            },
        ))
        .await
        .unwrap();
        assert_eq!(view.count().await, 0);
    }
}
