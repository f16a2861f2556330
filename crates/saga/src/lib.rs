//! Saga orchestration for multi-aggregate workflows.
//!
//! A saga is an ordered list of [`SagaStep`]s. The [`SagaOrchestrator`] runs
//! them one after another, persisting every transition in a [`SagaLog`]. When
//! a step fails, the steps that already succeeded are compensated in reverse
//! order; the saga ends COMPENSATED, or FAILED if any compensation failed.
//!
//! Three sagas are provided:
//! - [`TransferSaga`]: `DEBIT_SOURCE`, `CREDIT_TARGET`, `RECORD_TRANSFER`
//! - [`SettlementSaga`]: `FRAUD_CHECK`, `APPROVE_CLAIM`, `UPDATE_POLICY`,
//!   `NOTIFY_SETTLEMENT`
//! - [`FulfillmentSaga`]: `VALIDATE_STOCK`, `RESERVE_INVENTORY`,
//!   `PROCESS_PAYMENT`, `CONFIRM_ORDER`

pub mod context;
pub mod error;
pub mod fulfillment;
pub mod log;
pub mod orchestrator;
pub mod postgres;
pub mod repository;
pub mod retry;
pub mod services;
pub mod settlement;
pub mod state;
pub mod step;
pub mod transfer;

pub use context::{SAGA_ID_KEY, SagaContext};
pub use error::{Result, SagaError};
pub use fulfillment::{FulfillmentSaga, ORDER_FULFILLMENT, PAYMENT_ID_KEY, PAYMENT_LIMIT};
pub use log::{SagaLog, StepLog};
pub use orchestrator::SagaOrchestrator;
pub use postgres::PostgresSagaLogRepository;
pub use repository::{InMemorySagaLogRepository, SagaLogRepository};
pub use retry::RetryCompensation;
pub use services::{
    InMemoryInventoryService, InMemoryPaymentService, InventoryService, PaymentResult,
    PaymentService, Product,
};
pub use settlement::{
    CLAIM_SETTLEMENT, ClaimStatusNotification, NotificationStore, SettlementSaga,
};
pub use state::{SagaStatus, StepStatus};
pub use step::SagaStep;
pub use transfer::{FUND_TRANSFER, TransferSaga};
