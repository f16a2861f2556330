//! Payment service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::Money;
use tokio::sync::RwLock;

use crate::error::{Result, SagaError};

/// Result of a successful payment charge.
#[derive(Debug, Clone)]
pub struct PaymentResult {
    /// The payment ID assigned by the payment service.
    pub payment_id: String,
}

/// Trait for payment processing operations.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges a customer for an order.
    async fn charge(
        &self,
        order_id: &AggregateId,
        customer_id: &str,
        amount: Money,
    ) -> Result<PaymentResult>;

    /// Refunds a previously made payment. Unknown ids are ignored.
    async fn refund(&self, payment_id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<String, (AggregateId, String, Money)>,
    refunded: Vec<String>,
    next_id: u32,
    fail_on_charge: bool,
}

/// In-memory payment service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following charge call fail.
    pub async fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().await.fail_on_charge = fail;
    }

    /// Returns the number of payments not refunded.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }

    pub async fn has_payment(&self, payment_id: &str) -> bool {
        self.state.read().await.payments.contains_key(payment_id)
    }

    pub async fn refunded(&self) -> Vec<String> {
        self.state.read().await.refunded.clone()
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn charge(
        &self,
        order_id: &AggregateId,
        customer_id: &str,
        amount: Money,
    ) -> Result<PaymentResult> {
        let mut state = self.state.write().await;

        if state.fail_on_charge {
            return Err(SagaError::Payment("Payment declined".to_string()));
        }

        state.next_id += 1;
        let payment_id = format!("PAY-{:04}", state.next_id);
        state.payments.insert(
            payment_id.clone(),
            (order_id.clone(), customer_id.to_string(), amount),
        );

        Ok(PaymentResult { payment_id })
    }

    async fn refund(&self, payment_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.payments.remove(payment_id).is_some() {
            state.refunded.push(payment_id.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn charge_and_refund() {
        let payments = InMemoryPaymentService::new();
        let result = payments
            .charge(&AggregateId::new("ORD-1"), "CUST-1", Money::from_cents(5_000))
            .await
            .unwrap();
        assert_eq!(result.payment_id, "PAY-0001");
        assert!(payments.has_payment("PAY-0001").await);

        payments.refund(&result.payment_id).await.unwrap();
        payments.refund(&result.payment_id).await.unwrap();
        assert_eq!(payments.payment_count().await, 0);
        assert_eq!(payments.refunded().await, vec!["PAY-0001"]);
    }

    #[tokio::test]
    async fn fail_on_charge() {
        let payments = InMemoryPaymentService::new();
        payments.set_fail_on_charge(true).await;

        let result = payments
            .charge(&AggregateId::new("ORD-1"), "CUST-1", Money::from_cents(5_000))
            .await;
        assert!(matches!(result, Err(SagaError::Payment(_))));
        assert_eq!(payments.payment_count().await, 0);
    }
}
