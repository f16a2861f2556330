//! Account domain events.

use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

/// Events that can occur on a bank account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AccountEvent {
    AccountOpened {
        account_holder: String,
        initial_balance: Money,
        currency: String,
    },

    FundsDeposited {
        amount: Money,
        description: String,
    },

    FundsWithdrawn {
        amount: Money,
        description: String,
    },

    /// Debit leg of a transfer.
    FundsTransferredOut {
        amount: Money,
        target_account_id: String,
        description: String,
    },

    /// Credit leg of a transfer.
    FundsTransferredIn {
        amount: Money,
        source_account_id: String,
        description: String,
    },

    InterestAccrued {
        amount: Money,
    },

    AccountClosed,
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::AccountOpened { .. } => "AccountOpened",
            AccountEvent::FundsDeposited { .. } => "FundsDeposited",
            AccountEvent::FundsWithdrawn { .. } => "FundsWithdrawn",
            AccountEvent::FundsTransferredOut { .. } => "FundsTransferredOut",
            AccountEvent::FundsTransferredIn { .. } => "FundsTransferredIn",
            AccountEvent::InterestAccrued { .. } => "InterestAccrued",
            AccountEvent::AccountClosed => "AccountClosed",
        }
    }
}

impl AccountEvent {
    /// Signed effect of the event on the balance.
    pub fn balance_delta(&self) -> Money {
        match self {
            AccountEvent::AccountOpened {
                initial_balance, ..
            } => *initial_balance,
            AccountEvent::FundsDeposited { amount, .. }
            | AccountEvent::FundsTransferredIn { amount, .. }
            | AccountEvent::InterestAccrued { amount } => *amount,
            AccountEvent::FundsWithdrawn { amount, .. }
            | AccountEvent::FundsTransferredOut { amount, .. } => Money::zero() - *amount,
            AccountEvent::AccountClosed => Money::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use common::AggregateId;
    use event_store::Version;

    fn every_variant() -> Vec<AccountEvent> {
        vec![
            AccountEvent::AccountOpened {
                account_holder: "Wang".to_string(),
                initial_balance: Money::from_cents(10_000),
                currency: "TWD".to_string(),
            },
            AccountEvent::FundsDeposited {
                amount: Money::from_cents(500),
                description: "salary".to_string(),
            },
            AccountEvent::FundsWithdrawn {
                amount: Money::from_cents(200),
                description: "atm".to_string(),
            },
            AccountEvent::FundsTransferredOut {
                amount: Money::from_cents(100),
                target_account_id: "ACC-2".to_string(),
                description: "rent".to_string(),
            },
            AccountEvent::FundsTransferredIn {
                amount: Money::from_cents(100),
                source_account_id: "ACC-3".to_string(),
                description: "refund".to_string(),
            },
            AccountEvent::InterestAccrued {
                amount: Money::from_cents(7),
            },
            AccountEvent::AccountClosed,
        ]
    }

    #[test]
    fn every_variant_survives_the_envelope() {
        for (i, payload) in every_variant().into_iter().enumerate() {
            let event = Event::new(
                AggregateId::new("ACC-1"),
                Version::new(i as i64 + 1),
                payload.clone(),
            );
            let envelope = event.to_envelope("BankAccount").unwrap();
            assert_eq!(envelope.event_type, payload.event_type());
            assert_eq!(envelope.payload["type"], payload.event_type());

            let decoded = Event::<AccountEvent>::from_envelope(&envelope).unwrap();
            assert_eq!(decoded.payload, payload);
            assert_eq!(decoded.version, event.version);
        }
    }

    #[test]
    fn balance_deltas_are_signed() {
        let deltas: Vec<i64> = every_variant()
            .iter()
            .map(|e| e.balance_delta().cents())
            .collect();
        assert_eq!(deltas, vec![10_000, 500, -200, -100, 100, 7, 0]);
    }
}
